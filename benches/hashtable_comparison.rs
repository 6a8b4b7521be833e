use core::hash::Hash;
use core::hash::Hasher;
use core::hint::black_box;
use core::marker::PhantomData;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use h64::H64;
use h64::Strategy;
use hashbrown::hash_table::Entry as HashbrownEntry;
use hashbrown::hash_table::HashTable as HashbrownHashTable;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;
use siphasher::sip::SipHasher;

trait Keyed {
    fn new(key: u64) -> Self;

    fn hash_key(&self, seed: u64) -> u64;
    fn eq_key(&self, other: &Self) -> bool;
}

#[derive(Clone)]
struct TestItem {
    key: String,
    _value: u64,
}

impl Keyed for TestItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{:016X}", key),
            _value: key,
        })
    }

    fn hash_key(&self, seed: u64) -> u64 {
        let mut hasher = SipHasher::new_with_keys(seed, 0);
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct SmallTestItem {
    key: u64,
}

impl Keyed for SmallTestItem {
    fn new(key: u64) -> Self {
        black_box(Self { key })
    }

    fn hash_key(&self, seed: u64) -> u64 {
        let mut hasher = SipHasher::new_with_keys(seed, 0);
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Routes table hashing through the item's own keyed hash.
struct ByKey<T>(PhantomData<fn(&T)>);

impl<T> ByKey<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Keyed> Strategy<T> for ByKey<T> {
    #[inline]
    fn hash(&self, entry: &T, seed: u64) -> u64 {
        entry.hash_key(seed)
    }

    #[inline]
    fn eq(&self, a: &T, b: &T) -> bool {
        a.eq_key(b)
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 11),
    (1 << 12),
    (1 << 13),
    (1 << 14),
    (1 << 15),
    (1 << 16),
    (1 << 17),
    (1 << 18),
];

fn random_items<T: Keyed>(n: usize) -> Vec<T> {
    let mut rng = OsRng;
    (0..n)
        .map(|_| T::new(rng.try_next_u64().unwrap()))
        .collect()
}

fn sequential_items<T: Keyed>(n: usize) -> Vec<T> {
    (0..n as u64).map(T::new).collect()
}

fn shuffled<T: Clone>(items: &[T]) -> Vec<T> {
    let mut items = items.to_vec();
    items.shuffle(&mut SmallRng::from_os_rng());
    items
}

fn bench_insert_random<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "insert_random_{}",
        core::any::type_name::<T>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = random_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("h64/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |items| {
                    let mut table = H64::new(ByKey::<T>::new());
                    for item in &items {
                        black_box(table.insert(item));
                    }
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |items| {
                    let mut table = HashbrownHashTable::<&T>::with_capacity(0);
                    for item in &items {
                        let hash = item.hash_key(0);
                        match table.entry(hash, |v| v.eq_key(item), |v| v.hash_key(0)) {
                            HashbrownEntry::Vacant(entry) => {
                                black_box(entry.insert(item));
                            }
                            HashbrownEntry::Occupied(mut entry) => {
                                *entry.get_mut() = item;
                            }
                        }
                    }
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_insert_reserved<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "insert_reserved_{}",
        core::any::type_name::<T>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = random_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("h64/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |items| {
                    let mut table = H64::new(ByKey::<T>::new());
                    table.reserve(size);
                    for item in &items {
                        table.insert_new(item);
                    }
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |items| {
                    let mut table = HashbrownHashTable::<&T>::with_capacity(size);
                    for item in &items {
                        table.insert_unique(item.hash_key(0), item, |v| v.hash_key(0));
                    }
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_hit<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_hit_{}", core::any::type_name::<T>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<T>(size);
        let queries = shuffled(&items);
        group.throughput(Throughput::Elements(size as u64));

        let mut h64 = H64::new(ByKey::<T>::new());
        h64.extend(&items);
        group.bench_function(format!("h64/{size}"), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(h64.find(query));
                }
            })
        });

        let mut hashbrown = HashbrownHashTable::<&T>::with_capacity(0);
        for item in &items {
            hashbrown.insert_unique(item.hash_key(0), item, |v| v.hash_key(0));
        }
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(hashbrown.find(query.hash_key(0), |v| v.eq_key(query)));
                }
            })
        });
    }

    group.finish();
}

fn bench_find_miss<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_miss_{}", core::any::type_name::<T>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<T>(size);
        let queries = (size as u64..2 * size as u64)
            .map(T::new)
            .collect::<Vec<T>>();
        group.throughput(Throughput::Elements(size as u64));

        let mut h64 = H64::new(ByKey::<T>::new());
        h64.extend(&items);
        group.bench_function(format!("h64/{size}"), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(h64.find(query));
                }
            })
        });

        let mut hashbrown = HashbrownHashTable::<&T>::with_capacity(0);
        for item in &items {
            hashbrown.insert_unique(item.hash_key(0), item, |v| v.hash_key(0));
        }
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(hashbrown.find(query.hash_key(0), |v| v.eq_key(query)));
                }
            })
        });
    }

    group.finish();
}

fn bench_erase<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("erase_{}", core::any::type_name::<T>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("h64/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |order| {
                    let mut table = H64::new(ByKey::<T>::new());
                    table.extend(&items);
                    for query in &order {
                        black_box(table.erase(query));
                    }
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || shuffled(&items),
                |order| {
                    let mut table = HashbrownHashTable::<&T>::with_capacity(0);
                    for item in &items {
                        table.insert_unique(item.hash_key(0), item, |v| v.hash_key(0));
                    }
                    for query in &order {
                        let removed = match table.find_entry(query.hash_key(0), |v| v.eq_key(query))
                        {
                            Ok(entry) => Some(entry.remove().0),
                            Err(_) => None,
                        };
                        black_box(removed);
                    }
                    // Match h64, which gives memory back as it empties.
                    table.shrink_to_fit(|v| v.hash_key(0));
                    black_box(table.len())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_iteration<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("iteration_{}", core::any::type_name::<T>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<T>(size);
        group.throughput(Throughput::Elements(size as u64));

        let mut h64 = H64::new(ByKey::<T>::new());
        h64.extend(&items);
        group.bench_function(format!("h64/{size}"), |b| {
            b.iter(|| {
                for item in &h64 {
                    black_box(item);
                }
            })
        });

        let mut hashbrown = HashbrownHashTable::<&T>::with_capacity(0);
        for item in &items {
            hashbrown.insert_unique(item.hash_key(0), item, |v| v.hash_key(0));
        }
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for item in hashbrown.iter() {
                    black_box(item);
                }
            })
        });
    }

    group.finish();
}

#[derive(Clone, Copy)]
enum Operation {
    Insert,
    Erase,
    Find,
}

fn bench_mixed_probabilistic_zipf<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    for exponent in [1.0, 1.3] {
        let mut group = c.benchmark_group(format!(
            "mixed_probabilistic_zipf_{:.01}_{}",
            exponent,
            core::any::type_name::<T>()
        ));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        const KEY_SPACE_MULTIPLIER: usize = 2;

        for &size in SIZES[..=MAX_SIZE].iter() {
            let mut rng = SmallRng::from_os_rng();
            let op_distr = Zipf::new(3.0, exponent).unwrap();
            let key_distr = Zipf::new((size * KEY_SPACE_MULTIPLIER) as f64 - 1.0, 1.0).unwrap();

            // Keys are pre-built so the tables can borrow them for the whole run.
            let keys = sequential_items::<T>(size * KEY_SPACE_MULTIPLIER);
            let operations = (0..size * 3)
                .map(|_| {
                    let op_choice: f64 = rng.sample(op_distr);
                    let op = if op_choice <= 1.0 {
                        Operation::Find
                    } else if op_choice <= 2.0 {
                        Operation::Insert
                    } else {
                        Operation::Erase
                    };
                    let key = rng.sample(key_distr) as usize - 1;
                    (op, key)
                })
                .collect::<Vec<(Operation, usize)>>();

            group.throughput(Throughput::Elements(operations.len() as u64));
            group.bench_function(format!("h64/{size}"), |b| {
                b.iter(|| {
                    let mut table = H64::new(ByKey::<T>::new());
                    for &(op, key) in &operations {
                        let item = &keys[key];
                        match op {
                            Operation::Insert => {
                                black_box(table.insert(item));
                            }
                            Operation::Erase => {
                                black_box(table.erase(item));
                            }
                            Operation::Find => {
                                black_box(table.find(item));
                            }
                        }
                    }
                    black_box(table.len())
                })
            });

            group.bench_function(format!("hashbrown/{size}"), |b| {
                b.iter(|| {
                    let mut table = HashbrownHashTable::<&T>::with_capacity(0);
                    for &(op, key) in &operations {
                        let item = &keys[key];
                        let hash = item.hash_key(0);
                        match op {
                            Operation::Insert => {
                                match table.entry(hash, |v| v.eq_key(item), |v| v.hash_key(0)) {
                                    HashbrownEntry::Vacant(entry) => {
                                        black_box(entry.insert(item));
                                    }
                                    HashbrownEntry::Occupied(mut entry) => {
                                        *entry.get_mut() = item;
                                    }
                                }
                            }
                            Operation::Erase => {
                                let removed = match table.find_entry(hash, |v| v.eq_key(item)) {
                                    Ok(entry) => Some(entry.remove().0),
                                    Err(_) => None,
                                };
                                black_box(removed);
                            }
                            Operation::Find => {
                                black_box(table.find(hash, |v| v.eq_key(item)));
                            }
                        }
                    }
                    black_box(table.len())
                })
            });
        }

        group.finish();
    }
}

fn bench_churn<T: Keyed + Clone, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("churn_{}", core::any::type_name::<T>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for &size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<T>(size);
        // Every index twice: the first visit inserts, the second erases.
        let mut order = (0..size).flat_map(|i| [i, i]).collect::<Vec<usize>>();
        order.shuffle(&mut SmallRng::from_os_rng());
        group.throughput(Throughput::Elements(order.len() as u64));

        group.bench_function(format!("h64/{size}"), |b| {
            b.iter(|| {
                let mut table = H64::new(ByKey::<T>::new());
                for &i in &order {
                    let item = &items[i];
                    if table.erase(item).is_none() {
                        table.insert_new(item);
                    }
                }
                black_box(table.len())
            })
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                let mut table = HashbrownHashTable::<&T>::with_capacity(0);
                for &i in &order {
                    let item = &items[i];
                    let hash = item.hash_key(0);
                    match table.entry(hash, |v| v.eq_key(item), |v| v.hash_key(0)) {
                        HashbrownEntry::Vacant(entry) => {
                            black_box(entry.insert(item));
                        }
                        HashbrownEntry::Occupied(entry) => {
                            black_box(entry.remove().0);
                        }
                    }
                }
                black_box(table.len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mixed_probabilistic_zipf::<SmallTestItem, 8>,
    bench_mixed_probabilistic_zipf::<TestItem, 8>,
    bench_churn::<SmallTestItem, 8>,
    bench_churn::<TestItem, 8>,
    bench_insert_random::<SmallTestItem, 8>,
    bench_insert_random::<TestItem, 8>,
    bench_insert_reserved::<SmallTestItem, 8>,
    bench_insert_reserved::<TestItem, 8>,
    bench_find_hit::<SmallTestItem, 8>,
    bench_find_hit::<TestItem, 8>,
    bench_find_miss::<SmallTestItem, 8>,
    bench_find_miss::<TestItem, 8>,
    bench_erase::<SmallTestItem, 8>,
    bench_erase::<TestItem, 8>,
    bench_iteration::<SmallTestItem, 8>,
    bench_iteration::<TestItem, 8>,
);

criterion_main!(benches);
