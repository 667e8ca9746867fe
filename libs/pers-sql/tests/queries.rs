// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;

use std::sync::{Arc, Mutex};

use pers_sql::{FieldAffix, Object, Param, QueryConfig, QueryOutput, Val};
use test_log::test;

use common::{shop_session, shop_session_with_connector};

fn values(objects: &[Val], field: &str) -> Vec<Val> {
    objects
        .iter()
        .filter_map(|object| object.get(field))
        .cloned()
        .collect()
}

#[test(tokio::test)]
async fn missing_bridge_is_null() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Customer")
        .select("name, address.city")
        .order("{id}");
    let customers = query.exec().await.unwrap().into_items().unwrap().into_list();

    assert_eq!(
        customers,
        vec![
            Object::new("Customer")
                .with("name", "Alice")
                .with("address", Object::new("Address").with("city", "Paris")),
            Object::new("Customer")
                .with("name", "Bob")
                .with("address", Val::Null),
            Object::new("Customer")
                .with("name", "Carol")
                .with("address", Val::Null),
        ]
    );
}

#[test(tokio::test)]
async fn to_many_members_are_grouped_by_owner() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Customer")
        .select("name, orders.dateTime")
        .order("{id}");
    query.to_many("orders").unwrap().order("{dateTime}");

    let customers = query.exec().await.unwrap().into_items().unwrap().into_list();
    let orders: Vec<&[Val]> = customers
        .iter()
        .map(|customer| customer.get("orders").and_then(Val::as_list).unwrap())
        .collect();

    assert_eq!(
        values(orders[0], "dateTime"),
        [Val::from("2024-01-01"), Val::from("2024-02-01")]
    );
    assert_eq!(values(orders[1], "dateTime"), [Val::from("2024-03-01")]);
    assert!(orders[2].is_empty());
}

#[test(tokio::test)]
async fn nested_to_many_reaches_grandchildren() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Customer")
        .select("name, orders.items.quantity, orders.items.product.name")
        .filter_with("{id} = ?", vec![Param::from(1)]);
    query.to_many("orders").unwrap().order("{id}");
    query.to_many("orders.items").unwrap().order("{id}");

    let customers = query.exec().await.unwrap().into_items().unwrap().into_list();
    assert_eq!(customers.len(), 1);

    let orders = customers[0].get("orders").and_then(Val::as_list).unwrap();
    assert_eq!(orders.len(), 2);

    let items = orders[0].get("items").and_then(Val::as_list).unwrap();
    assert_eq!(values(items, "quantity"), [Val::from(2), Val::from(1)]);
    assert_eq!(
        items[1].as_object().and_then(|item| item.get_path("product.name")),
        Some(&Val::from("Tee"))
    );
    assert_eq!(orders[1].get("items"), Some(&Val::List(vec![])));
}

#[test(tokio::test)]
async fn to_many_chain_runs_one_query_per_level() {
    let (session, connector) = shop_session_with_connector(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Customer")
        .select("name, orders.items.quantity")
        .order("{id}");
    query.to_many("orders").unwrap().order("{id}");
    query.to_many("orders.items").unwrap().order("{id}");

    let customers = query.exec().await.unwrap().into_items().unwrap().into_list();
    assert_eq!(connector.statements().len(), 3);

    let quantities = |customer: &Object| -> Vec<Vec<Val>> {
        customer
            .get("orders")
            .and_then(Val::as_list)
            .unwrap()
            .iter()
            .map(|order| values(order.get("items").and_then(Val::as_list).unwrap(), "quantity"))
            .collect()
    };

    assert_eq!(
        quantities(&customers[0]),
        vec![vec![Val::from(2), Val::from(1)], vec![]]
    );
    assert_eq!(quantities(&customers[1]), vec![vec![Val::from(4)]]);
    assert!(quantities(&customers[2]).is_empty());
}

#[test(tokio::test)]
async fn orders_carry_their_customers() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Order")
        .select("*, customer.*")
        .filter_with("{id} <> ?", vec![Param::from(11)])
        .order("{id}");
    let orders = query.exec().await.unwrap().into_items().unwrap().into_list();

    assert_eq!(orders.len(), 2);
    for order in &orders {
        let customer_id = order.get("customerId").unwrap();
        assert_eq!(order.get_path("customer.id"), Some(customer_id));
    }
    assert_eq!(orders[0].get_path("customer.name"), Some(&Val::from("Alice")));
    assert_eq!(orders[1].get_path("customer.name"), Some(&Val::from("Bob")));
}

#[test(tokio::test)]
async fn indexed_page_with_total_count() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query
        .from("Order")
        .select("id, dateTime")
        .index("id")
        .order("{id}")
        .limit(2)
        .count_without_limit();

    let output = query.exec().await.unwrap();
    assert_eq!(output.total_count(), Some(3));

    let orders = output.items().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(
        orders.get(&Val::from(11)).and_then(|order| order.get("dateTime")),
        Some(&Val::from("2024-02-01"))
    );
    assert!(orders.get(&Val::from(12)).is_none());
}

#[test(tokio::test)]
async fn streaming_hands_over_each_object() {
    let session = shop_session(QueryConfig::default());

    let ids = Arc::new(Mutex::new(vec![]));
    let total = Arc::new(Mutex::new(None));
    let ended = Arc::new(Mutex::new(false));

    let mut query = session.query();
    {
        let ids = ids.clone();
        let total = total.clone();
        let ended = ended.clone();
        query
            .from("Order")
            .select("id")
            .order("{id} DESC")
            .count_without_limit()
            .on_object(move |order, _| ids.lock().unwrap().push(order.get("id").cloned()))
            .on_count(move |count| *total.lock().unwrap() = Some(count))
            .on_end(move || *ended.lock().unwrap() = true);
    }

    let output = query.exec().await.unwrap();

    assert_eq!(
        output,
        QueryOutput::Streamed {
            total_count: Some(3)
        }
    );
    assert_eq!(
        *ids.lock().unwrap(),
        vec![Some(Val::from(12)), Some(Val::from(11)), Some(Val::from(10))]
    );
    assert_eq!(*total.lock().unwrap(), Some(3));
    assert!(*ended.lock().unwrap());
}

#[test(tokio::test)]
async fn affix_fallback_resolves_physical_column() {
    let session = shop_session(QueryConfig {
        field_affix: Some(FieldAffix::new("_fk", "suffix").unwrap()),
        ..Default::default()
    });

    let mut query = session.query();
    query
        .from("Invoice")
        .select("total, customer")
        .filter_with("{customer} = ?", vec![Param::from(1)]);
    let invoices = query.exec().await.unwrap().into_items().unwrap().into_list();

    assert_eq!(
        invoices,
        vec![
            Object::new("Invoice")
                .with("total", 99.5)
                .with("customer", Val::from(1i64))
        ]
    );
}

#[test(tokio::test)]
async fn subquery_parameter_filters_by_its_rows() {
    let session = shop_session(QueryConfig::default());

    let mut buyers = session.query();
    buyers
        .from("Order")
        .select("customerId")
        .filter_with("{dateTime} > ?", vec![Param::from("2024-01-15")]);

    let mut query = session.query();
    query
        .from("Customer")
        .select("name")
        .filter_with("{id} IN ?", vec![Param::from(buyers)])
        .order("{name}");
    let customers = query.exec().await.unwrap().into_items().unwrap().into_list();

    let names: Vec<_> = customers.iter().filter_map(|c| c.get("name")).collect();
    assert_eq!(names, [&Val::from("Alice"), &Val::from("Bob")]);
}

#[test(tokio::test)]
async fn subtype_queries_are_restricted_to_their_rows() {
    let session = shop_session(QueryConfig::default());

    let mut query = session.query();
    query.from("Shirt").select("name").order("{price}");
    let shirts = query.exec().await.unwrap().into_items().unwrap().into_list();

    assert_eq!(
        shirts,
        vec![
            Object::new("Shirt").with("name", "Tee"),
            Object::new("Shirt").with("name", "Polo"),
        ]
    );
}
