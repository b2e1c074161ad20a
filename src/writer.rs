//! CSV Writer: the six fixed-schema output tables, opened lazily in
//! `out_dir` and appended to across files in the same run — mirroring the
//! Python original's `write_table`, which reopens each table file in
//! append mode and writes a header only the first time the file appears.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::FlattenResult;
use crate::rows::{enum_as_string, CodeRow, FileRow, GroupRow, PlanRow, PriceRow};

fn enum_cell<T: serde::Serialize>(v: &Option<T>) -> String {
    match v.as_ref().map(enum_as_string) {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Files,
    Plans,
    PlansFiles,
    Codes,
    Prices,
    ProviderGroups,
    PricesProviderGroups,
}

impl Table {
    fn filename(self) -> &'static str {
        match self {
            Table::Files => "files.csv",
            Table::Plans => "plans.csv",
            Table::PlansFiles => "plans_files.csv",
            Table::Codes => "codes.csv",
            Table::Prices => "prices.csv",
            Table::ProviderGroups => "provider_groups.csv",
            Table::PricesProviderGroups => "prices_provider_groups.csv",
        }
    }

    fn header(self) -> &'static [&'static str] {
        match self {
            Table::Files => &["filename", "filename_hash", "url"],
            Table::Plans => &[
                "reporting_entity_name",
                "reporting_entity_type",
                "plan_name",
                "plan_id",
                "plan_id_type",
                "plan_market_type",
                "last_updated_on",
                "version",
                "plan_hash",
            ],
            Table::PlansFiles => &["plan_hash", "filename_hash"],
            Table::Codes => &["billing_code_type", "billing_code_type_version", "billing_code", "code_hash"],
            Table::Prices => &[
                "billing_class",
                "negotiated_type",
                "expiration_date",
                "negotiated_rate",
                "additional_information",
                "service_code",
                "billing_code_modifier",
                "code_hash",
                "filename_hash",
                "price_hash",
            ],
            Table::ProviderGroups => &["npi_numbers", "tin_type", "tin_value", "provider_group_hash"],
            Table::PricesProviderGroups => &["provider_group_hash", "price_hash"],
        }
    }
}

/// Holds one open, append-mode `csv::Writer` per table touched so far in
/// this run, writing each table's header only the first time it's opened.
pub struct TableWriter {
    out_dir: PathBuf,
    handles: HashMap<Table, csv::Writer<std::fs::File>>,
}

impl TableWriter {
    pub fn new(out_dir: impl AsRef<Path>) -> FlattenResult<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&out_dir)?;
        Ok(TableWriter { out_dir, handles: HashMap::new() })
    }

    fn writer_for(&mut self, table: Table) -> FlattenResult<&mut csv::Writer<std::fs::File>> {
        if !self.handles.contains_key(&table) {
            let path = self.out_dir.join(table.filename());
            let file_exists = path.exists();
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            if !file_exists {
                writer.write_record(table.header())?;
            }
            self.handles.insert(table, writer);
        }
        Ok(self.handles.get_mut(&table).unwrap())
    }

    pub fn write_file(&mut self, row: &FileRow) -> FlattenResult<()> {
        let writer = self.writer_for(Table::Files)?;
        writer.write_record([row.filename.clone(), row.filename_hash.to_string(), row.url.clone()])?;
        Ok(())
    }

    pub fn write_plan(&mut self, row: &PlanRow) -> FlattenResult<()> {
        let h = &row.header;
        let writer = self.writer_for(Table::Plans)?;
        writer.write_record([
            h.reporting_entity_name.clone().unwrap_or_default(),
            enum_cell(&h.reporting_entity_type),
            h.plan_name.clone().unwrap_or_default(),
            h.plan_id.clone().unwrap_or_default(),
            enum_cell(&h.plan_id_type),
            enum_cell(&h.plan_market_type),
            h.last_updated_on.clone().unwrap_or_default(),
            h.version.clone().unwrap_or_default(),
            row.plan_hash.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_plan_file(&mut self, plan_hash: u64, filename_hash: u64) -> FlattenResult<()> {
        let writer = self.writer_for(Table::PlansFiles)?;
        writer.write_record([plan_hash.to_string(), filename_hash.to_string()])?;
        Ok(())
    }

    pub fn write_code(&mut self, row: &CodeRow) -> FlattenResult<()> {
        let writer = self.writer_for(Table::Codes)?;
        writer.write_record([
            row.billing_code_type.clone(),
            row.billing_code_type_version.clone(),
            row.billing_code.clone(),
            row.code_hash.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_price(&mut self, row: &PriceRow) -> FlattenResult<()> {
        let writer = self.writer_for(Table::Prices)?;
        writer.write_record([
            value_to_cell(&row.billing_class),
            value_to_cell(&row.negotiated_type),
            value_to_cell(&row.expiration_date),
            value_to_cell(&row.negotiated_rate),
            value_to_cell(&row.additional_information),
            row.service_code.clone().unwrap_or_default(),
            row.billing_code_modifier.clone().unwrap_or_default(),
            row.code_hash.to_string(),
            row.filename_hash.to_string(),
            row.price_hash.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_group(&mut self, row: &GroupRow) -> FlattenResult<()> {
        let writer = self.writer_for(Table::ProviderGroups)?;
        writer.write_record([
            row.npi_numbers.clone(),
            row.tin_type.clone(),
            row.tin_value.clone(),
            row.provider_group_hash.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_price_group_link(&mut self, provider_group_hash: u64, price_hash: u64) -> FlattenResult<()> {
        let writer = self.writer_for(Table::PricesProviderGroups)?;
        writer.write_record([provider_group_hash.to_string(), price_hash.to_string()])?;
        Ok(())
    }

    pub fn flush_all(&mut self) -> FlattenResult<()> {
        for writer in self.handles.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn value_to_cell(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
