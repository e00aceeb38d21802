// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stun_wire::attribute::AttributeType;
use stun_wire::message::{Message, MessageClass, Method};
use stun_wire::transaction::TransactionId;

fn build_request(attributes: &[(AttributeType, &[u8])]) -> Vec<u8> {
    let mut msg = Message::with_transaction_id(
        MessageClass::Request,
        Method::Binding,
        TransactionId::Current([0; 12]),
    );
    for (atype, value) in attributes {
        msg.add_attribute(*atype, value.to_vec()).unwrap();
    }
    msg.to_bytes()
}

fn bench_message_write(c: &mut Criterion) {
    let one: &[(AttributeType, &[u8])] = &[(AttributeType::Username, b"someuser")];
    let four: &[(AttributeType, &[u8])] = &[
        (AttributeType::Username, b"someuser"),
        (AttributeType::Realm, b"example.org"),
        (AttributeType::Nonce, b"5a0b2c"),
        (AttributeType::XorMappedAddress, &[0; 8]),
    ];

    let mut group = c.benchmark_group("Message/Build");

    group.throughput(criterion::Throughput::Bytes(build_request(one).len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter("Username"), &one, |b, attrs| {
        b.iter(|| build_request(attrs))
    });

    group.throughput(criterion::Throughput::Bytes(
        build_request(four).len() as u64
    ));
    group.bench_with_input(
        BenchmarkId::from_parameter("Attributes/4"),
        &four,
        |b, attrs| b.iter(|| build_request(attrs)),
    );

    group.finish();
}

criterion_group!(write, bench_message_write);
criterion_main!(write);
