// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use pers_sql::{
    DatabaseConnector, DatabaseError, EntityBuilder, EscapeStyle, ExecuteResult, QueryConfig, Row,
    Schema, Session, Val,
};
use rusqlite::{
    Connection, params_from_iter,
    types::{Value, ValueRef},
};

const SHOP: &str = r#"
CREATE TABLE "Address" (id INTEGER PRIMARY KEY, city TEXT, street TEXT);
CREATE TABLE "Customer" (id INTEGER PRIMARY KEY, name TEXT, addressId INTEGER);
CREATE TABLE "Order" (id INTEGER PRIMARY KEY, customerId INTEGER, dateTime TEXT);
CREATE TABLE "OrderItem" (id INTEGER PRIMARY KEY, orderId INTEGER, productId INTEGER, quantity INTEGER);
CREATE TABLE "Product" (id INTEGER PRIMARY KEY, name TEXT, price REAL, type TEXT);
CREATE TABLE "Invoice" (invoice_pk INTEGER PRIMARY KEY, customer_fk INTEGER, total REAL);

INSERT INTO "Address" VALUES (1, 'Paris', 'Rue Cler');

INSERT INTO "Customer" VALUES (1, 'Alice', 1);
INSERT INTO "Customer" VALUES (2, 'Bob', NULL);
INSERT INTO "Customer" VALUES (3, 'Carol', NULL);

INSERT INTO "Order" VALUES (10, 1, '2024-01-01');
INSERT INTO "Order" VALUES (11, 1, '2024-02-01');
INSERT INTO "Order" VALUES (12, 2, '2024-03-01');

INSERT INTO "Product" VALUES (1, 'Mug', 5.0, NULL);
INSERT INTO "Product" VALUES (2, 'Tee', 20.0, 'shirt');
INSERT INTO "Product" VALUES (3, 'Polo', 30.0, 'shirt');

INSERT INTO "OrderItem" VALUES (100, 10, 1, 2);
INSERT INTO "OrderItem" VALUES (101, 10, 2, 1);
INSERT INTO "OrderItem" VALUES (102, 12, 3, 4);

INSERT INTO "Invoice" VALUES (1, 1, 99.5);
"#;

/// A connector over one in-memory SQLite connection. Every statement it runs is logged.
pub struct SqliteConnector {
    connection: Arc<Mutex<Connection>>,
    statements: Arc<Mutex<Vec<String>>>,
}

impl SqliteConnector {
    pub fn shop() -> Self {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch(SHOP).unwrap();
        Self {
            connection: Arc::new(Mutex::new(connection)),
            statements: Arc::default(),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn connection(&self, sql: &str) -> MutexGuard<'_, Connection> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.connection.lock().unwrap()
    }
}

fn sqlite_error(error: rusqlite::Error) -> DatabaseError {
    DatabaseError::BoxedError(Box::new(error))
}

fn to_sqlite(value: &Val) -> Value {
    match value {
        Val::Null => Value::Null,
        Val::Bool(value) => Value::Integer(*value as i64),
        Val::Number(number) => match number.as_i64() {
            Some(integer) => Value::Integer(integer),
            None => Value::Real(number.as_f64().unwrap_or_default()),
        },
        Val::String(value) => Value::Text(value.clone()),
        Val::Binary(value) => Value::Blob(value.to_vec()),
        other => Value::Text(other.to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Val {
    match value {
        ValueRef::Null => Val::Null,
        ValueRef::Integer(integer) => Val::from(integer),
        ValueRef::Real(real) => Val::from(real),
        ValueRef::Text(text) => Val::from(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Val::Binary(Bytes::copy_from_slice(blob)),
    }
}

#[async_trait]
impl DatabaseConnector for SqliteConnector {
    fn escape_identifier(&self, name: &str) -> String {
        EscapeStyle::DoubleQuote.escape(name)
    }

    async fn execute(&self, sql: &str, params: &[Val]) -> Result<ExecuteResult, DatabaseError> {
        let connection = self.connection(sql);
        let row_count = connection
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))
            .map_err(sqlite_error)?;

        let last_insert_id = sql
            .starts_with("INSERT")
            .then(|| Val::from(connection.last_insert_rowid()));

        Ok(ExecuteResult {
            last_insert_id,
            row_count: row_count as u64,
        })
    }

    async fn query(&self, sql: &str, params: &[Val]) -> Result<Vec<Row>, DatabaseError> {
        let connection = self.connection(sql);
        let mut statement = connection.prepare(sql).map_err(sqlite_error)?;
        let labels: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = statement
            .query(params_from_iter(params.iter().map(to_sqlite)))
            .map_err(sqlite_error)?;

        let mut result = vec![];
        while let Some(row) = rows.next().map_err(sqlite_error)? {
            let mut converted = Row::new();
            for (index, label) in labels.iter().enumerate() {
                let value = row.get_ref(index).map_err(sqlite_error)?;
                converted.insert(label.clone(), from_sqlite(value));
            }
            result.push(converted);
        }
        Ok(result)
    }

    async fn acquire(&self) -> Result<Arc<dyn DatabaseConnector>, DatabaseError> {
        Ok(Arc::new(SqliteConnector {
            connection: self.connection.clone(),
            statements: self.statements.clone(),
        }))
    }
}

/// Customers with an address and orders; orders with items; items referring to products, of
/// which shirts are stored in the same table.
pub fn shop_schema() -> Schema {
    Schema::builder()
        .entity(
            EntityBuilder::new("Customer")
                .columns(["id", "name", "addressId"])
                .bridge("address", "addressId", "Address")
                .to_many("orders", "Order", "customerId"),
        )
        .entity(EntityBuilder::new("Address").columns(["id", "city", "street"]))
        .entity(
            EntityBuilder::new("Order")
                .columns(["id", "customerId", "dateTime"])
                .bridge("customer", "customerId", "Customer")
                .to_many("items", "OrderItem", "orderId"),
        )
        .entity(
            EntityBuilder::new("OrderItem")
                .columns(["id", "orderId", "productId", "quantity"])
                .bridge("order", "orderId", "Order")
                .bridge("product", "productId", "Product"),
        )
        .entity(EntityBuilder::new("Product").columns(["id", "name", "price", "type"]))
        .entity(
            EntityBuilder::new("Shirt")
                .table("Product")
                .columns(["id", "name", "price", "type"])
                .discriminator("type", "shirt"),
        )
        .entity(
            EntityBuilder::new("Invoice")
                .primary_key("invoice_pk")
                .columns(["invoice_pk", "customer_fk", "total"])
                .bridge("buyer", "customer_fk", "Customer"),
        )
        .build()
        .unwrap()
}

pub fn shop_session(config: QueryConfig) -> Session {
    shop_session_with_connector(config).0
}

/// A shop session along with its connector, for checking the statements a call ran
pub fn shop_session_with_connector(config: QueryConfig) -> (Session, Arc<SqliteConnector>) {
    let connector = Arc::new(SqliteConnector::shop());
    let session = Session::new(Arc::new(shop_schema()), connector.clone(), config);
    (session, connector)
}
