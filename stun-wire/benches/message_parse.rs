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

fn bench_message_parse(c: &mut Criterion) {
    let header_only = Message::new(MessageClass::Request, Method::Binding).to_bytes();

    let mut msg = Message::new(MessageClass::Request, Method::Binding);
    msg.add_attribute(AttributeType::Username, b"someuser".to_vec())
        .unwrap();
    msg.add_attribute(AttributeType::Realm, b"example.org".to_vec())
        .unwrap();
    msg.add_attribute(AttributeType::Nonce, b"5a0b2c".to_vec())
        .unwrap();
    msg.add_attribute(AttributeType::XorMappedAddress, vec![0; 8])
        .unwrap();
    let with_attributes = msg.to_bytes();

    let mut group = c.benchmark_group("Message/Parse");

    group.throughput(criterion::Throughput::Bytes(header_only.len() as u64));
    group.bench_with_input(
        BenchmarkId::from_parameter("HeaderOnly"),
        &header_only,
        |b, data| b.iter(|| Message::from_bytes(data).unwrap()),
    );

    group.throughput(criterion::Throughput::Bytes(with_attributes.len() as u64));
    group.bench_with_input(
        BenchmarkId::from_parameter("Attributes/4"),
        &with_attributes,
        |b, data| b.iter(|| Message::from_bytes(data).unwrap()),
    );

    group.finish();
}

criterion_group!(parse, bench_message_parse);
criterion_main!(parse);
