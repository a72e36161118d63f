use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 9] = [
    "op",
    "amount",
    "currency",
    "code",
    "instrument_id",
    "account_id",
    "token",
    "customer",
    "idempotency_key",
];

/// Writes an operations CSV with the standard header.
pub fn write_ops(path: &Path, rows: &[[&str; 9]]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
