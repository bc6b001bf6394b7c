//! Fixture helpers shared by the repository integration tests.

#![allow(dead_code)]

use sqlx::PgPool;

pub async fn seed_tenant(pool: &PgPool, name: &str) -> i64 {
    let row: (i64,) = sqlx::query_as("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

pub async fn seed_class(pool: &PgPool, tenant_id: i64, name: &str) -> i64 {
    let row: (i64,) =
        sqlx::query_as("INSERT INTO classes (tenant_id, name) VALUES ($1, $2) RETURNING id")
            .bind(tenant_id)
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap();
    row.0
}

pub async fn seed_student(
    pool: &PgPool,
    tenant_id: i64,
    class_id: Option<i64>,
    name: &str,
    card_id: Option<&str>,
) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO students (tenant_id, class_id, name, card_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(tenant_id)
    .bind(class_id)
    .bind(name)
    .bind(card_id)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}
