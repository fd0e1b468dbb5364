use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sxl_parser::{Reader, XmlEvent};

fn sample_document(items: usize) -> String {
    let mut doc = String::from("<?xml version=\"1.0\"?><catalog xmlns:inv=\"urn:example:inventory\">");
    for i in 0..items {
        doc.push_str(&format!(
            "<inv:item sku=\"item-{i}\" price=\"{i}.99\"><name>Item &amp; part {i}</name>\
             <desc><![CDATA[raw <desc> {i}]]></desc></inv:item>"
        ));
    }
    doc.push_str("</catalog>");
    doc
}

fn count_events(input: &str) -> usize {
    let mut reader = Reader::from_str(input);
    let mut elements = 0usize;
    while let Some(event) = reader.next().unwrap() {
        if let XmlEvent::StartElement { .. } = event {
            elements += 1;
        }
    }
    elements
}

fn bench_event_stream(c: &mut Criterion) {
    let doc = sample_document(500);
    c.bench_function("pull 500 items", |b| {
        b.iter(|| count_events(black_box(&doc)))
    });
}

criterion_group!(benches, bench_event_stream);
criterion_main!(benches);
