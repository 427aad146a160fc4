use std::io::{self, Write};

use serde::Serialize;

use crate::domain::CompoundRecord;
use crate::report::ProviderReport;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_records(records: &[CompoundRecord]) -> io::Result<()> {
        Self::write_json(&mut io::stdout(), records)
    }

    pub fn print_reports(reports: &[ProviderReport]) -> io::Result<()> {
        Self::write_json(&mut io::stderr(), reports)
    }

    pub fn write_json<W: Write, T: Serialize + ?Sized>(
        writer: &mut W,
        value: &T,
    ) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
