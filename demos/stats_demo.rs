use clap::Parser;
use h64::H64;
use h64::Seeding;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "count", default_value_t = 1000)]
    count: u64,

    /// Hash with a fixed seed instead of the group array address.
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Erase every other value after filling.
    #[arg(short = 'e', long = "erase_half")]
    erase_half: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let values: Vec<u64> = (0..args.count).collect();
    let seeding = args.seed.map_or(Seeding::Address, Seeding::Fixed);
    let mut table = H64::with_seeding(h64::StdStrategy, seeding);

    println!("Filling table with {} u64 values...", values.len());
    for value in &values {
        if table.insert(value).is_some() {
            panic!("Value already exists in table: {}", value);
        }
    }

    println!(
        "Inserted {} values into {} groups",
        table.len(),
        table.group_count()
    );
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);
    table.stats().print();

    table.reset_stats();
    let found = values
        .iter()
        .filter(|&&v| table.contains(&(v + args.count)))
        .count();
    assert_eq!(found, 0);
    println!("Lookups of {} absent values:", values.len());
    table.stats().print();

    if args.erase_half {
        table.reset_stats();
        for value in values.iter().step_by(2) {
            table.erase(value);
        }
        println!("After erasing every other value ({} left):", table.len());
        table.stats().print();
    }
}
