//! Summarize every column of a log.

use brolog::LogSpec;

fn main() -> Result<(), brolog::Error> {
    let spec = LogSpec::load("conn.log")?;
    let mut stats = spec.accumulators();

    for row in spec.open("conn.log")? {
        stats.accumulate_row(&row?);
    }

    println!("{} rows, layout {}", stats.rows(), spec.id());
    for (name, accumulator) in stats.iter() {
        println!("{:<20} {}", name, accumulator.summary());
    }

    Ok(())
}
