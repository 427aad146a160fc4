//! Raw provider JSON to [`CompoundRecord`]. Every accessor is guarded; missing
//! or mistyped fields fall back to the record defaults.

use serde_json::Value;

use crate::domain::CompoundRecord;

pub fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|value| value.as_str())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

pub fn pubchem_identifiers(raw: &Value) -> Option<Vec<u64>> {
    let list = raw.get("IdentifierList")?;
    let cids = list
        .get("CID")
        .and_then(|value| value.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| match value {
                    Value::Number(number) => number.as_u64(),
                    Value::String(text) => text.trim().parse::<u64>().ok(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Some(cids)
}

pub fn pubchem_list_key(raw: &Value) -> Option<String> {
    raw.get("Waiting")
        .and_then(|waiting| waiting.get("ListKey"))
        .and_then(identifier)
}

pub fn pubchem_record(raw: &Value, url: String) -> CompoundRecord {
    let props = raw
        .get("PropertyTable")
        .and_then(|table| table.get("Properties"))
        .and_then(|props| props.as_array())
        .and_then(|props| props.first())
        .unwrap_or(&Value::Null);
    CompoundRecord::new(
        text(props, "IUPACName").or_else(|| text(props, "Title")),
        text(props, "MolecularFormula"),
        props.get("MolecularWeight").and_then(lenient_number),
        url,
    )
}

pub fn massbank_accessions(raw: &Value) -> (Vec<String>, usize) {
    let entries = raw
        .get("data")
        .and_then(|data| data.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut accessions = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match entry.get("accession").and_then(identifier) {
            Some(accession) => accessions.push(accession),
            None => skipped += 1,
        }
    }
    (accessions, skipped)
}

pub fn massbank_record(raw: &Value, url: String) -> CompoundRecord {
    let compound = raw.get("compound").unwrap_or(&Value::Null);
    let name = compound
        .get("names")
        .and_then(|names| names.as_array())
        .and_then(|names| names.first())
        .and_then(|name| name.as_str())
        .map(|name| name.to_string());
    CompoundRecord::new(
        name,
        text(compound, "formula"),
        compound.get("mass").and_then(lenient_number),
        url,
    )
}

/// HMDB answers either with a bare array or with `{"data": [...]}`.
pub fn hmdb_records(raw: &Value, record_url: &str) -> Vec<CompoundRecord> {
    let entries = match raw {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(_) => raw
            .get("data")
            .and_then(|data| data.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| {
            let mass = entry
                .get("moldb_mono_mass")
                .and_then(lenient_number)
                .filter(|mass| *mass != 0.0)
                .or_else(|| entry.get("moldb_average_mass").and_then(lenient_number));
            let url = entry
                .get("hmdb_id")
                .and_then(identifier)
                .map(|id| format!("{record_url}/{id}"))
                .unwrap_or_default();
            CompoundRecord::new(
                text(entry, "name"),
                text(entry, "moldb_formula").or_else(|| text(entry, "formula")),
                mass,
                url,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pubchem_pending_job_has_no_identifiers() {
        let raw = json!({"Waiting": {"ListKey": "123456", "Message": "Your request is running"}});
        assert_eq!(pubchem_identifiers(&raw), None);
        assert_eq!(pubchem_list_key(&raw).as_deref(), Some("123456"));
    }

    #[test]
    fn pubchem_identifiers_accept_numbers_and_strings() {
        let raw = json!({"IdentifierList": {"CID": [2244, "1983", null]}});
        assert_eq!(pubchem_identifiers(&raw), Some(vec![2244, 1983]));
    }

    #[test]
    fn pubchem_weight_as_string() {
        let raw = json!({"PropertyTable": {"Properties": [{
            "CID": 2244,
            "MolecularFormula": "C9H8O4",
            "MolecularWeight": "180.16",
            "IUPACName": "2-acetyloxybenzoic acid"
        }]}});
        let record = pubchem_record(&raw, "u".to_string());
        assert_eq!(record.weight(), 180.16);
        assert_eq!(record.name(), "2-acetyloxybenzoic acid");
    }

    #[test]
    fn pubchem_falls_back_to_title() {
        let raw = json!({"PropertyTable": {"Properties": [{"Title": "Aspirin"}]}});
        assert_eq!(pubchem_record(&raw, String::new()).name(), "Aspirin");
    }

    #[test]
    fn pubchem_record_tolerates_garbage() {
        let record = pubchem_record(&json!([1, 2, 3]), String::new());
        assert_eq!(record.name(), "unknown");
        assert_eq!(record.formula(), "N/A");
    }

    #[test]
    fn massbank_skips_entries_without_accession() {
        let raw = json!({"data": [{"accession": "MSBNK-001"}, {"title": "x"}, {"accession": ""}]});
        let (accessions, skipped) = massbank_accessions(&raw);
        assert_eq!(accessions, vec!["MSBNK-001".to_string()]);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn massbank_record_uses_first_name() {
        let raw = json!({
            "compound": {
                "names": ["Caffeine", "1,3,7-trimethylxanthine"],
                "formula": "C8H10N4O2",
                "mass": 194.0804
            }
        });
        let record = massbank_record(&raw, "u".to_string());
        assert_eq!(record.name(), "Caffeine");
        assert_eq!(record.weight(), 194.0804);
    }

    #[test]
    fn hmdb_mass_falls_back_to_average() {
        let raw = json!({"data": [
            {
                "name": "Glucose",
                "formula": "C6H12O6",
                "moldb_mono_mass": "",
                "moldb_average_mass": 180.156,
                "hmdb_id": "HMDB0000122"
            },
            {"name": "Mystery"}
        ]});
        let records = hmdb_records(&raw, "https://hmdb.ca/metabolites");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].formula(), "C6H12O6");
        assert_eq!(records[0].weight(), 180.156);
        assert_eq!(records[0].url(), "https://hmdb.ca/metabolites/HMDB0000122");
        assert_eq!(records[1].weight(), 0.0);
        assert_eq!(records[1].url(), "");
    }

    #[test]
    fn hmdb_prefers_moldb_fields() {
        let raw = json!([{
            "name": "Alanine",
            "moldb_formula": "C3H7NO2",
            "formula": "ignored",
            "moldb_mono_mass": 89.0477,
            "moldb_average_mass": 89.09
        }]);
        let records = hmdb_records(&raw, "https://hmdb.ca/metabolites");
        assert_eq!(records[0].formula(), "C3H7NO2");
        assert_eq!(records[0].weight(), 89.0477);
    }
}
