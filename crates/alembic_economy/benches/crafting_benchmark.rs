//! Benchmark for production ticks and craft resolution.
//!
//! Run with: cargo bench --package alembic_economy --bench crafting_benchmark

use alembic_economy::{
    content, CraftRequest, CraftingConfig, EconomyConfig, RateInputs, RecipeResolver, ScaledNumber, SeededRandom,
    Tier, Workshop,
};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn stocked_workshop() -> Workshop {
    let mut workshop = Workshop::new(EconomyConfig::default().shared()).unwrap();
    workshop.set_click_power(ScaledNumber::from_count(100));
    workshop.click().unwrap();
    workshop
}

fn benchmark_tick(c: &mut Criterion) {
    let mut workshop = stocked_workshop();

    c.bench_function("workshop_tick_60hz", |b| {
        b.iter(|| black_box(workshop.tick(black_box(1.0 / 60.0))));
    });
}

fn benchmark_success_rate(c: &mut Criterion) {
    let config = CraftingConfig::default();
    let resolver = RecipeResolver::new(&config);
    let inputs = RateInputs {
        base_success_rate: 0.6,
        alchemist_level: 4,
        equipment_bonus: 0.10,
        weighted_purity: 83.0,
        min_purity_required: 60.0,
        lowest_purity: 47.0,
        ingredient_count: 4,
        pending_penalty: 0.05,
        discovery: false,
    };

    c.bench_function("success_rate", |b| {
        b.iter(|| black_box(resolver.success_rate(black_box(&inputs))));
    });
}

fn benchmark_craft(c: &mut Criterion) {
    let mut template = stocked_workshop();
    for _ in 0..1_000 {
        template.tick(1.0).unwrap();
    }
    template.click().unwrap();
    let mut rng = SeededRandom::new(11);

    c.bench_function("craft_bittersweet", |b| {
        b.iter_batched(
            || {
                let mut workshop = template.clone();
                let joy = workshop.distill(Tier::Smiles, ScaledNumber::from_count(6)).unwrap();
                let sadness = workshop.distill(Tier::Sighs, ScaledNumber::from_count(4)).unwrap();
                let request = CraftRequest {
                    recipe: content::BITTERSWEET,
                    inputs: vec![joy, sadness],
                    equipment: None,
                };
                (workshop, request)
            },
            |(mut workshop, request)| black_box(workshop.craft(&request, &mut rng)),
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_offline(c: &mut Criterion) {
    c.bench_function("offline_catch_up_8h", |b| {
        b.iter_batched(
            stocked_workshop,
            |mut workshop| black_box(workshop.offline_catch_up(8.0 * 3600.0)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    benchmark_tick,
    benchmark_success_rate,
    benchmark_craft,
    benchmark_offline
);
criterion_main!(benches);
