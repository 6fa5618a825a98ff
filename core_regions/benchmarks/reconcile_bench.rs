use core_regions::{
    reconcile_active_cases, reconcile_populations, Area, AreaId, AreaKind, AreaTree,
    ReconcileConfig, TracingSink,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// World -> continents -> countries -> cities, with roughly a third of the
/// populations missing and forecasts only at the world and some countries.
fn synthetic_tree(countries_per_continent: usize, cities_per_country: usize) -> AreaTree {
    let mut rng = SmallRng::seed_from_u64(0x5EED_0FA1);
    let mut tree = AreaTree::new();
    let world = tree
        .insert(Area::new(["World"], AreaKind::World), None)
        .expect("world");
    tree[world].estimates.forecast_mean = Some(250_000.0);

    for continent_idx in 0..6 {
        let continent = tree
            .insert(
                Area::new([format!("Continent {continent_idx}")], AreaKind::Continent),
                Some(world),
            )
            .expect("continent");
        for country_idx in 0..countries_per_continent {
            let mut country = Area::new(
                [format!("Country {continent_idx}-{country_idx}")],
                AreaKind::Country,
            );
            if rng.gen_bool(0.8) {
                country.population = Some(rng.gen_range(500_000..200_000_000));
            }
            if rng.gen_bool(0.1) {
                country.estimates.forecast_mean = Some(rng.gen_range(10.0..2_000.0));
            }
            let country = tree.insert(country, Some(continent)).expect("country");
            add_cities(&mut tree, &mut rng, country, cities_per_country);
        }
    }
    tree
}

fn add_cities(tree: &mut AreaTree, rng: &mut SmallRng, country: AreaId, count: usize) {
    let prefix = tree[country].key().to_string();
    for city_idx in 0..count {
        let mut city = Area::new([format!("{prefix} city {city_idx}")], AreaKind::City);
        if rng.gen_bool(0.66) {
            city.population = Some(rng.gen_range(20_000..5_000_000));
        }
        if rng.gen_bool(0.5) {
            city.estimates.confirmed_active = Some(rng.gen_range(0.0..500.0));
        }
        tree.insert(city, Some(country)).expect("city");
    }
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let config = ReconcileConfig::default();

    for countries in [8usize, 32, 128] {
        group.bench_with_input(
            BenchmarkId::new("populations", countries),
            &countries,
            |b, &countries| {
                b.iter_batched(
                    || synthetic_tree(countries, 12),
                    |mut tree| {
                        reconcile_populations(&mut tree, &config, &mut TracingSink)
                            .expect("valid tree");
                    },
                    BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("populations_and_active", countries),
            &countries,
            |b, &countries| {
                b.iter_batched(
                    || synthetic_tree(countries, 12),
                    |mut tree| {
                        reconcile_populations(&mut tree, &config, &mut TracingSink)
                            .expect("valid tree");
                        reconcile_active_cases(&mut tree, &config, &mut TracingSink)
                            .expect("valid tree");
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(reconcile_benches, bench_reconcile);
criterion_main!(reconcile_benches);
