//! Print two columns of a log, with readable UTC timestamps.

use brolog::{Cut, CutWriter, FormatOptions, LogReader, RowWriter};

fn main() -> Result<(), brolog::Error> {
    let mut reader = LogReader::open("conn.log")?;

    println!("#path {}", reader.spec().path());

    let spec = reader.spec().clone();
    let cut = Cut::new(spec.fields(), &["ts", "id.orig_h"], false)?;
    let options = FormatOptions::new().readable_time(true).utc(true);
    let mut writer = CutWriter::new(std::io::stdout(), cut, options);

    for row in reader.rows() {
        match row {
            Ok(row) => writer.write_row(&spec, &row)?,
            Err(err) => eprintln!("{}", err),
        }
    }

    let stats = writer.finish()?;
    eprintln!("{}", stats.summary());

    Ok(())
}
