use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use contract_cluster::cluster::ClusterEngine;
use contract_cluster::dataset::Dataset;
use contract_cluster::index::IdentityIndex;
use contract_cluster::resolver::{IdentityResolver, IdentityValues};

// ------------- synthetic contracts -------------
// 50k rows where every cpf is shared by ~5 rows and every name by ~50
fn contracts(rows: usize) -> Dataset {
    let mut csv = String::from("id_contrato,cpf_assinante,nome_assinante,cnpj_assinante,valor\n");
    for i in 0..rows {
        let cnpj = if i % 7 == 0 { format!("{}", i % 97) } else { String::new() };
        csv.push_str(&format!("c{i:06},{},nome{},{cnpj},{i}\n", i / 5, i % (rows / 50)));
    }
    Dataset::from_reader(csv.as_bytes(), b',').unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let dataset = Arc::new(contracts(50_000));
    let attributes = vec![
        "cpf_assinante".to_string(),
        "nome_assinante".to_string(),
        "cnpj_assinante".to_string(),
    ];

    c.bench_function("build identity index", |b| {
        b.iter(|| IdentityIndex::build(black_box(&dataset), &attributes))
    });

    let index = Arc::new(IdentityIndex::build(&dataset, &attributes));
    let engine = ClusterEngine::new(Arc::clone(&dataset), Arc::clone(&index), Some("id_contrato".into()));
    let seed = dataset.get(12_345).unwrap();
    c.bench_function("cluster one seed", |b| b.iter(|| engine.cluster(black_box(&seed))));

    let resolver = IdentityResolver::new(Arc::clone(&dataset), index, 200);
    let mut values = IdentityValues::new();
    values.insert("nome_assinante".into(), "nome7".into());
    values.insert("cnpj_assinante".into(), "7".into());
    c.bench_function("partial match", |b| b.iter(|| resolver.partial_match(black_box(&values))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
