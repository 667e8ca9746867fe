// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

use super::{EntityBuilder, Schema};

/// Customers with an address and orders; orders with items; items referring to products, of
/// which shirts are a subtype stored in the same table.
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
