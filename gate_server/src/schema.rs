//! Diesel table definitions for the gateway.
//!
//! Tables: sql_workflow, sql_users.

diesel::table! {
    sql_workflow (id) {
        id -> Int8,
        workflow_name -> Varchar,
        engineer -> Varchar,
        review_man -> Text,
        create_time -> Timestamptz,
        finish_time -> Nullable<Timestamptz>,
        status -> Varchar,
        is_backup -> Bool,
        review_content -> Text,
        cluster_name -> Varchar,
        reviewok_time -> Nullable<Timestamptz>,
        sql_content -> Text,
        execute_result -> Nullable<Text>,
    }
}

diesel::table! {
    sql_users (id) {
        id -> Int8,
        username -> Varchar,
        password -> Varchar,
        display -> Varchar,
        role -> Varchar,
        is_active -> Bool,
    }
}
