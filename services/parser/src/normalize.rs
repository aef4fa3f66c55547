//! Schema reconciliation and coercion: raw extract in, canonical table out.
//!
//! The pass is deterministic (same bytes, same schema = same table) and
//! total once the source parses:
//! - numeric fields are always present and finite; absent disclosure is zero
//! - categorical fields are always present, trimmed, upper-cased, non-empty
//! - the fiscal year is an `i32` or `None`, never a placeholder value

use serde::Serialize;

use crate::decode::decode_source;
use crate::error::NormalizeError;
use crate::raw::{RawTable, SourceFormat};
use crate::schema::{self, CanonicalField, FieldKind, SCHEMA, SECTOR_FALLBACK_OFFSET, SETOR_ATIVIDADE};
use crate::table::{CanonicalTable, Column, ColumnData};

/// Where a canonical column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// The header already carried the canonical name.
    Canonical,
    Alias { header: String },
    Position { offset: usize, header: String },
    /// Not found; filled with zeros, sentinels or missing years.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub field: &'static str,
    #[serde(flatten)]
    pub source: ColumnSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeWarning {
    /// No header matched; the column was synthesized.
    MissingColumn { field: &'static str, filled_with: String },
    /// The sector column was taken by position rather than by name.
    PositionalFallback { field: &'static str, offset: usize, header: String },
    /// The fallback position is already mapped to another canonical field.
    PositionalFallbackSkipped { offset: usize, claimed_by: &'static str },
    /// A second column named like a canonical field; dropped.
    DuplicateHeader { header: String },
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeWarning::MissingColumn { field, filled_with } => {
                write!(f, "column for '{}' not found, filled with '{}'", field, filled_with)
            }
            NormalizeWarning::PositionalFallback { field, offset, header } => write!(
                f,
                "'{}' taken from column {} ('{}') by position; verify the source layout",
                field, offset, header
            ),
            NormalizeWarning::PositionalFallbackSkipped { offset, claimed_by } => write!(
                f,
                "column {} already mapped to '{}', positional fallback not applied",
                offset, claimed_by
            ),
            NormalizeWarning::DuplicateHeader { header } => {
                write!(f, "duplicate column '{}' dropped", header)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizeReport {
    /// Encoding used to decode text sources; `None` for workbooks.
    pub encoding: Option<&'static str>,
    pub rows: usize,
    pub resolutions: Vec<Resolution>,
    /// Source columns kept as-is because no canonical field claimed them.
    pub passthrough: Vec<String>,
    pub warnings: Vec<NormalizeWarning>,
    /// Non-empty numeric cells that failed to parse and became zero.
    pub coerced_cells: usize,
    /// Non-empty year cells that did not hold a usable year.
    pub invalid_years: usize,
    /// Set when the source could not be parsed at all.
    pub failure: Option<String>,
}

impl NormalizeReport {
    pub fn resolution(&self, field: &str) -> Option<&ColumnSource> {
        self.resolutions.iter().find(|r| r.field == field).map(|r| &r.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: CanonicalTable,
    pub report: NormalizeReport,
}

impl Normalized {
    /// The explicit "no data" result: every canonical column, zero rows.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            table: CanonicalTable::empty(),
            report: NormalizeReport {
                failure: Some(reason.into()),
                ..NormalizeReport::default()
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.report.failure.is_none() && !self.table.is_empty()
    }
}

/// Decode, parse and normalize one raw extract.
pub fn normalize(bytes: &[u8]) -> Result<Normalized, NormalizeError> {
    let (raw, encoding) = match SourceFormat::sniff(bytes) {
        SourceFormat::Workbook => (RawTable::from_workbook(bytes)?, None),
        SourceFormat::DelimitedText => {
            let decoded = decode_source(bytes);
            tracing::debug!(encoding = decoded.encoding.name(), bom = decoded.had_bom, "decoded source");
            (RawTable::from_csv_text(&decoded.text)?, Some(decoded.encoding.name()))
        }
    };

    let mut normalized = normalize_raw(raw);
    normalized.report.encoding = encoding;
    Ok(normalized)
}

/// Like [`normalize`], but a parse failure becomes [`Normalized::failed`]
/// instead of an error, so callers only ever see a table.
pub fn normalize_or_empty(bytes: &[u8]) -> Normalized {
    match normalize(bytes) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::error!(error = %e, "normalization failed");
            Normalized::failed(e.to_string())
        }
    }
}

/// Resolve, rename and coerce an already parsed raw table. Never fails,
/// even for a hand-built table with ragged rows or padded headers.
pub fn normalize_raw(raw: RawTable) -> Normalized {
    let RawTable { headers, rows } = RawTable::new(raw.headers, raw.rows);
    let row_count = rows.len();
    let plan = resolve_columns(&headers);

    let mut report = NormalizeReport {
        rows: row_count,
        warnings: plan.warnings,
        ..NormalizeReport::default()
    };
    let mut columns = Vec::with_capacity(SCHEMA.len() + plan.passthrough.len());

    for (field, source) in SCHEMA.iter().zip(plan.sources) {
        let index = source.as_ref().map(|(i, _)| *i);
        let cells = || rows.iter().map(move |row| index.map_or("", |i| row[i].as_str()));

        let data = match field.kind {
            FieldKind::Numeric => ColumnData::Numeric(
                cells()
                    .map(|cell| {
                        parse_amount(cell).unwrap_or_else(|| {
                            if !cell.trim().is_empty() {
                                report.coerced_cells += 1;
                            }
                            0.0
                        })
                    })
                    .collect(),
            ),
            FieldKind::Categorical => {
                let sentinel = field.sentinel();
                ColumnData::Text(
                    cells()
                        .map(|cell| standardize_label(cell).unwrap_or_else(|| sentinel.clone()))
                        .collect(),
                )
            }
            FieldKind::Year => ColumnData::Year(
                cells()
                    .map(|cell| {
                        let year = parse_year(cell);
                        if year.is_none() && !cell.trim().is_empty() {
                            report.invalid_years += 1;
                        }
                        year
                    })
                    .collect(),
            ),
        };

        let source = match source {
            Some((_, source)) => {
                tracing::debug!(field = field.name, source = ?source, "column resolved");
                source
            }
            None => {
                let filled_with = missing_fill(field);
                match field.kind {
                    FieldKind::Categorical => tracing::warn!(
                        field = field.name,
                        sentinel = %filled_with,
                        "column not found, using placeholder value"
                    ),
                    _ => tracing::debug!(field = field.name, "column not found, synthesized"),
                }
                report.warnings.push(NormalizeWarning::MissingColumn {
                    field: field.name,
                    filled_with,
                });
                ColumnSource::Synthesized
            }
        };

        report.resolutions.push(Resolution {
            field: field.name,
            source,
        });
        columns.push(Column {
            name: field.name.to_string(),
            data,
        });
    }

    for index in plan.passthrough {
        let name = headers[index].clone();
        columns.push(Column {
            name: name.clone(),
            data: ColumnData::Text(rows.iter().map(|row| row[index].clone()).collect()),
        });
        report.passthrough.push(name);
    }

    if report.coerced_cells > 0 {
        tracing::debug!(cells = report.coerced_cells, "unparseable numeric cells set to zero");
    }
    if report.invalid_years > 0 {
        tracing::info!(rows = report.invalid_years, "rows without a usable fiscal year");
    }
    tracing::info!(
        rows = row_count,
        columns = columns.len(),
        passthrough = report.passthrough.len(),
        warnings = report.warnings.len(),
        "normalized table"
    );

    Normalized {
        table: CanonicalTable::from_columns(columns, row_count),
        report,
    }
}

fn missing_fill(field: &CanonicalField) -> String {
    match field.kind {
        FieldKind::Numeric => "0".to_string(),
        FieldKind::Categorical => field.sentinel(),
        FieldKind::Year => String::new(),
    }
}

/// Column mapping decided before any cell is touched.
#[derive(Debug)]
struct ResolutionPlan {
    /// One entry per `SCHEMA` field, in order.
    sources: Vec<Option<(usize, ColumnSource)>>,
    /// Raw column indexes kept as passthrough.
    passthrough: Vec<usize>,
    warnings: Vec<NormalizeWarning>,
}

fn resolve_columns(headers: &[String]) -> ResolutionPlan {
    let mut claimed: Vec<Option<&'static str>> = vec![None; headers.len()];
    let mut sources: Vec<Option<(usize, ColumnSource)>> = vec![None; SCHEMA.len()];
    let mut warnings = Vec::new();

    let take = |claimed: &mut Vec<Option<&'static str>>, wanted: &str, field: &'static str| {
        let index = headers
            .iter()
            .enumerate()
            .position(|(i, h)| h == wanted && claimed[i].is_none())?;
        claimed[index] = Some(field);
        Some(index)
    };

    // Canonical names first, so an alias can never steal a column that
    // already carries another field's canonical name.
    for (slot, field) in sources.iter_mut().zip(SCHEMA) {
        if let Some(index) = take(&mut claimed, field.name, field.name) {
            *slot = Some((index, ColumnSource::Canonical));
        }
    }

    for (slot, field) in sources.iter_mut().zip(SCHEMA) {
        if slot.is_some() {
            continue;
        }
        for alias in field.aliases {
            if let Some(index) = take(&mut claimed, *alias, field.name) {
                *slot = Some((
                    index,
                    ColumnSource::Alias {
                        header: headers[index].clone(),
                    },
                ));
                break;
            }
        }
    }

    if let Some(sector) = SCHEMA.iter().position(|f| f.name == SETOR_ATIVIDADE) {
        if sources[sector].is_none() && headers.len() > SECTOR_FALLBACK_OFFSET {
            let offset = SECTOR_FALLBACK_OFFSET;
            match claimed[offset] {
                None => {
                    let header = headers[offset].clone();
                    tracing::warn!(
                        field = SETOR_ATIVIDADE,
                        offset,
                        header = %header,
                        "no sector alias matched, adopting column by position; verify the source layout"
                    );
                    claimed[offset] = Some(SETOR_ATIVIDADE);
                    warnings.push(NormalizeWarning::PositionalFallback {
                        field: SETOR_ATIVIDADE,
                        offset,
                        header: header.clone(),
                    });
                    sources[sector] = Some((offset, ColumnSource::Position { offset, header }));
                }
                Some(other) => {
                    tracing::warn!(offset, claimed_by = other, "sector fallback column already mapped");
                    warnings.push(NormalizeWarning::PositionalFallbackSkipped {
                        offset,
                        claimed_by: other,
                    });
                }
            }
        }
    }

    let mut passthrough = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if claimed[index].is_some() {
            continue;
        }
        if schema::field(header).is_some() {
            tracing::warn!(header = %header, "duplicate canonical column dropped");
            warnings.push(NormalizeWarning::DuplicateHeader {
                header: header.clone(),
            });
            continue;
        }
        passthrough.push(index);
    }

    ResolutionPlan {
        sources,
        passthrough,
        warnings,
    }
}

/// Parse a monetary or count cell. Anything that is not a finite number
/// (including `NaN`/`inf` spellings) is rejected.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a fiscal year written as an integer (`2023`) or an integral float
/// (`2023.0`, as spreadsheet round-trips produce).
pub fn parse_year(cell: &str) -> Option<i32> {
    let trimmed = cell.trim();
    let year = match trimmed.parse::<i32>() {
        Ok(year) => year,
        Err(_) => {
            let value = parse_amount(trimmed)?;
            if value.fract() != 0.0 {
                return None;
            }
            value as i32
        }
    };
    (1900..=2100).contains(&year).then_some(year)
}

/// Trim and upper-case a label; `None` when nothing is left.
pub fn standardize_label(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{fields_of_kind, ANO_REFER, NOME_COMPANHIA, ORGAO_ADMINISTRACAO, UF_SEDE};

    fn run(csv: &str) -> Normalized {
        normalize(csv.as_bytes()).unwrap()
    }

    /// 45 generic headers with `sector_header` at the fallback offset.
    fn wide_csv(sector_header: &str, sector_value: &str) -> String {
        let mut headers: Vec<String> = (0..45).map(|i| format!("COL_{:02}", i)).collect();
        headers[0] = "DENOM_CIA".to_string();
        headers[SECTOR_FALLBACK_OFFSET] = sector_header.to_string();
        let mut values: Vec<String> = (0..45).map(|i| i.to_string()).collect();
        values[0] = "acme".to_string();
        values[SECTOR_FALLBACK_OFFSET] = sector_value.to_string();
        format!("{}\n{}\n", headers.join(","), values.join(","))
    }

    // -------------------------------------------------------------------------
    // COLUMN PRESENCE
    // -------------------------------------------------------------------------

    #[test]
    fn test_every_canonical_column_is_present_for_any_source() {
        let sources = [
            "DENOM_CIA\nACME\n",
            "BONUS,SALARIO\n1,2\n",
            "UNRELATED\nx\n",
            "DENOM_CIA,Ano do Exercício Social,SETOR\nACME,2023,Energia\n",
        ];
        for csv in sources {
            let normalized = run(csv);
            for field in SCHEMA {
                let column = normalized
                    .table
                    .column(field.name)
                    .unwrap_or_else(|| panic!("{} missing for {:?}", field.name, csv));
                assert_eq!(column.data.len(), normalized.table.len());
            }
        }
    }

    #[test]
    fn test_absent_numeric_columns_are_zero() {
        let normalized = run("DENOM_CIA\nACME\nBETA\n");
        for field in fields_of_kind(FieldKind::Numeric) {
            assert_eq!(normalized.table.numeric(field.name).unwrap(), &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_absent_categorical_columns_use_sentinel() {
        let normalized = run("BONUS\n10\n");
        for field in fields_of_kind(FieldKind::Categorical) {
            assert_eq!(normalized.table.text(field.name).unwrap(), &[field.sentinel()]);
            assert!(normalized.report.warnings.contains(&NormalizeWarning::MissingColumn {
                field: field.name,
                filled_with: field.sentinel(),
            }));
        }
        assert_eq!(
            normalized.table.text(SETOR_ATIVIDADE).unwrap()[0],
            "SETOR ATIVIDADE NÃO INFORMADO"
        );
    }

    #[test]
    fn test_absent_year_column_yields_no_years() {
        let normalized = run("DENOM_CIA\nACME\n");
        assert_eq!(normalized.table.years().unwrap(), &[None]);
        assert!(normalized.table.all().years().is_empty());
    }

    // -------------------------------------------------------------------------
    // ALIAS RESOLUTION
    // -------------------------------------------------------------------------

    #[test]
    fn test_alias_renames_to_canonical() {
        let normalized = run("DENOM_CIA,Orgao_Administracao,SALARIO\nAcme,Conselho de Administração,100\n");
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["ACME"]);
        assert_eq!(
            normalized.table.text(ORGAO_ADMINISTRACAO).unwrap(),
            &["CONSELHO DE ADMINISTRAÇÃO"]
        );
        assert_eq!(normalized.table.numeric("REM_FIXA_SALARIO").unwrap(), &[100.0]);
        assert_eq!(
            normalized.report.resolution(NOME_COMPANHIA),
            Some(&ColumnSource::Alias {
                header: "DENOM_CIA".to_string()
            })
        );
    }

    #[test]
    fn test_alias_list_order_beats_column_order() {
        // Both spellings present; the list-first alias wins even though it
        // appears later in the file.
        let csv = "REMUNERACAO_MAXIMA,Valor_Maior_Remuneracao_Individual\n111,222\n";
        for _ in 0..5 {
            let normalized = run(csv);
            assert_eq!(normalized.table.numeric("REM_MAXIMA_INDIVIDUAL").unwrap(), &[222.0]);
            assert_eq!(normalized.report.passthrough, vec!["REMUNERACAO_MAXIMA"]);
        }
    }

    #[test]
    fn test_alias_precedence_for_every_multi_alias_field() {
        for field in SCHEMA.iter().filter(|f| f.aliases.len() > 1 && f.is_numeric()) {
            // Reverse order in the file: the last alias first.
            let headers: Vec<&str> = field.aliases.iter().rev().copied().collect();
            let values: Vec<String> = (0..headers.len()).rev().map(|i| (i + 1).to_string()).collect();
            let csv = format!("{}\n{}\n", headers.join(","), values.join(","));
            let normalized = run(&csv);
            // aliases[0] carries the value 1
            assert_eq!(normalized.table.numeric(field.name).unwrap(), &[1.0], "{}", field.name);
        }
    }

    #[test]
    fn test_canonical_header_beats_alias() {
        let normalized = run("DENOM_CIA,NOME_COMPANHIA\nold,new\n");
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["NEW"]);
        assert_eq!(normalized.report.resolution(NOME_COMPANHIA), Some(&ColumnSource::Canonical));
        assert_eq!(normalized.report.passthrough, vec!["DENOM_CIA"]);
    }

    #[test]
    fn test_headers_with_padding_still_match() {
        let normalized = run("  DENOM_CIA  , UF_SEDE \nacme,sp\n");
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["ACME"]);
        assert_eq!(normalized.table.text(UF_SEDE).unwrap(), &["SP"]);
    }

    #[test]
    fn test_unknown_columns_pass_through_untouched() {
        let normalized = run("DENOM_CIA,CNPJ_CIA\nacme, 00.000.000/0001-91 \n");
        assert_eq!(normalized.report.passthrough, vec!["CNPJ_CIA"]);
        assert_eq!(normalized.table.text("CNPJ_CIA").unwrap(), &[" 00.000.000/0001-91 "]);
        let last = normalized.table.columns().last().unwrap();
        assert_eq!(last.name, "CNPJ_CIA");
    }

    #[test]
    fn test_duplicate_canonical_header_is_dropped() {
        let normalized = run("UF_SEDE,UF_SEDE\nSP,RJ\n");
        assert_eq!(normalized.table.text(UF_SEDE).unwrap(), &["SP"]);
        assert!(normalized.report.passthrough.is_empty());
        assert_eq!(
            normalized.table.column_names().filter(|n| *n == UF_SEDE).count(),
            1
        );
        assert!(normalized.report.warnings.contains(&NormalizeWarning::DuplicateHeader {
            header: UF_SEDE.to_string()
        }));
    }

    // -------------------------------------------------------------------------
    // SECTOR POSITIONAL FALLBACK
    // -------------------------------------------------------------------------

    #[test]
    fn test_positional_fallback_applies_with_42_columns() {
        let normalized = run(&wide_csv("Ramo", " energia "));
        assert_eq!(normalized.table.text(SETOR_ATIVIDADE).unwrap(), &["ENERGIA"]);
        assert_eq!(
            normalized.report.resolution(SETOR_ATIVIDADE),
            Some(&ColumnSource::Position {
                offset: 41,
                header: "Ramo".to_string()
            })
        );
        assert!(normalized
            .report
            .warnings
            .iter()
            .any(|w| matches!(w, NormalizeWarning::PositionalFallback { offset: 41, .. })));
        assert!(!normalized.report.passthrough.contains(&"Ramo".to_string()));
    }

    #[test]
    fn test_positional_fallback_exactly_42_columns() {
        let headers: Vec<String> = (0..42).map(|i| format!("C{}", i)).collect();
        let values: Vec<String> = (0..42).map(|i| format!("v{}", i)).collect();
        let normalized = run(&format!("{}\n{}\n", headers.join(","), values.join(",")));
        assert_eq!(normalized.table.text(SETOR_ATIVIDADE).unwrap(), &["V41"]);
    }

    #[test]
    fn test_alias_beats_positional_fallback() {
        let mut csv = wide_csv("Ramo", "ignored");
        csv = csv.replacen("COL_05", "Setor de Atividade", 1);
        let normalized = run(&csv);
        assert_eq!(normalized.table.text(SETOR_ATIVIDADE).unwrap(), &["5"]);
        assert!(normalized.report.passthrough.contains(&"Ramo".to_string()));
    }

    #[test]
    fn test_narrow_source_uses_sentinel_instead_of_position() {
        let headers: Vec<String> = (0..41).map(|i| format!("C{}", i)).collect();
        let values: Vec<String> = (0..41).map(|i| i.to_string()).collect();
        let normalized = run(&format!("{}\n{}\n", headers.join(","), values.join(",")));
        assert_eq!(
            normalized.table.text(SETOR_ATIVIDADE).unwrap(),
            &["SETOR ATIVIDADE NÃO INFORMADO"]
        );
        assert_eq!(normalized.report.resolution(SETOR_ATIVIDADE), Some(&ColumnSource::Synthesized));
    }

    #[test]
    fn test_positional_fallback_never_steals_a_mapped_column() {
        let normalized = run(&wide_csv("UF_SEDE", "sp"));
        assert_eq!(normalized.table.text(UF_SEDE).unwrap(), &["SP"]);
        assert_eq!(
            normalized.table.text(SETOR_ATIVIDADE).unwrap(),
            &["SETOR ATIVIDADE NÃO INFORMADO"]
        );
        assert!(normalized.report.warnings.contains(&NormalizeWarning::PositionalFallbackSkipped {
            offset: 41,
            claimed_by: UF_SEDE,
        }));
    }

    // -------------------------------------------------------------------------
    // COERCION
    // -------------------------------------------------------------------------

    #[test]
    fn test_unparseable_numbers_become_zero() {
        let normalized = run("BONUS\n1500.75\nn/a\n\"\"\n\"1.234,56\"\nNaN\ninf\n-20\n 42 \n");
        assert_eq!(
            normalized.table.numeric("REM_VAR_BONUS").unwrap(),
            &[1500.75, 0.0, 0.0, 0.0, 0.0, 0.0, -20.0, 42.0]
        );
        // n/a, 1.234,56, NaN, inf
        assert_eq!(normalized.report.coerced_cells, 4);
    }

    #[test]
    fn test_categorical_trim_and_uppercase() {
        let normalized = run("Orgao_Administracao\n\"  diretoria estatutária  \"\n");
        assert_eq!(
            normalized.table.text(ORGAO_ADMINISTRACAO).unwrap(),
            &["DIRETORIA ESTATUTÁRIA"]
        );
    }

    #[test]
    fn test_blank_categorical_cell_uses_sentinel() {
        let normalized = run("UF_SEDE,DENOM_CIA\n  ,acme\nrj,beta\n");
        assert_eq!(
            normalized.table.text(UF_SEDE).unwrap(),
            &["UF SEDE NÃO INFORMADO", "RJ"]
        );
    }

    #[test]
    fn test_year_integrity() {
        let normalized = run("Ano do Exercício Social,BONUS\n2023,1\nn/a,2\n,3\n2024.0,4\n20.5,5\n");
        assert_eq!(
            normalized.table.years().unwrap(),
            &[Some(2023), None, None, Some(2024), None]
        );
        assert_eq!(normalized.report.invalid_years, 2);
        // Rows without a year stay in the table, only year filtering skips them.
        assert_eq!(normalized.table.len(), 5);
        assert_eq!(normalized.table.all().sum("REM_VAR_BONUS"), 15.0);
        assert_eq!(normalized.table.all().years(), vec![2023, 2024]);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_amount(" 12.5 "), Some(12.5));
        assert_eq!(parse_amount("1e3"), Some(1000.0));
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("-inf"), None);
        assert_eq!(parse_year("2023"), Some(2023));
        assert_eq!(parse_year(" 2023 "), Some(2023));
        assert_eq!(parse_year("2023.0"), Some(2023));
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("99"), None);
        assert_eq!(standardize_label("  sp "), Some("SP".to_string()));
        assert_eq!(standardize_label("   "), None);
    }

    // -------------------------------------------------------------------------
    // FIXED POINT & DETERMINISM
    // -------------------------------------------------------------------------

    #[test]
    fn test_normalizing_canonical_output_is_a_fixed_point() {
        let csv = "DENOM_CIA,Ano do Exercício Social,Orgao_Administracao,SETOR,BONUS,SALARIO,EXTRA\n\
                   acme ,2023, diretoria estatutária,energia,1500.5,oops,keep me\n\
                   beta,n/a,conselho de administração,,12,3000,\n";
        let first = run(csv);
        let bytes = first.table.to_csv_bytes().unwrap();
        let second = run(std::str::from_utf8(&bytes).unwrap());
        assert_eq!(first.table, second.table);

        let third = run(std::str::from_utf8(&second.table.to_csv_bytes().unwrap()).unwrap());
        assert_eq!(second.table, third.table);
    }

    #[test]
    fn test_determinism_multiple_runs() {
        let csv = "SALARIO,DENOM_CIA,Setor de Atividade\n10,a,x\n20,b,y\n";
        let baseline = run(csv);
        for _ in 0..10 {
            assert_eq!(run(csv), baseline);
        }
    }

    // -------------------------------------------------------------------------
    // ENCODINGS & FAILURES
    // -------------------------------------------------------------------------

    #[test]
    fn test_latin1_source() {
        let normalized = normalize(b"DENOM_CIA,Setor de Atividade\nA\xE7os S.A.,Metalurgia\n").unwrap();
        assert_eq!(normalized.report.encoding, Some("windows-1252"));
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["AÇOS S.A."]);
    }

    #[test]
    fn test_bom_source_resolves_first_header() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("DENOM_CIA,UF_SEDE\nacme,sp\n".as_bytes());
        let normalized = normalize(&bytes).unwrap();
        assert_eq!(normalized.report.encoding, Some("UTF-8"));
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["ACME"]);
    }

    #[test]
    fn test_header_only_source_is_an_empty_well_typed_table() {
        let normalized = run("DENOM_CIA,BONUS\n");
        assert!(normalized.table.is_empty());
        assert!(!normalized.is_available());
        assert_eq!(normalized.table.all().sum("REM_VAR_BONUS"), 0.0);
        assert!(normalized.table.column(ANO_REFER).is_some());
    }

    #[test]
    fn test_parse_failure_degrades_to_empty_table() {
        let normalized = normalize_or_empty(b"DENOM_CIA;UF_SEDE\nacme;sp\n");
        assert!(!normalized.is_available());
        assert!(normalized.table.is_empty());
        assert!(normalized.report.failure.as_deref().unwrap().contains("semicolon"));
        for field in SCHEMA {
            assert!(normalized.table.column(field.name).is_some());
        }
    }

    #[test]
    fn test_hand_built_ragged_table_is_squared() {
        let raw = RawTable {
            headers: vec![" DENOM_CIA ".to_string(), "BONUS".to_string(), "UF_SEDE".to_string()],
            rows: vec![
                vec!["acme".to_string()],
                vec!["beta".to_string(), "7".to_string(), "rj".to_string(), "extra".to_string()],
            ],
        };
        let normalized = normalize_raw(raw);
        assert_eq!(normalized.report.resolution(NOME_COMPANHIA), Some(&ColumnSource::Alias {
            header: "DENOM_CIA".to_string()
        }));
        assert_eq!(normalized.table.text(NOME_COMPANHIA).unwrap(), &["ACME", "BETA"]);
        assert_eq!(normalized.table.numeric("REM_VAR_BONUS").unwrap(), &[0.0, 7.0]);
        assert_eq!(normalized.table.text(UF_SEDE).unwrap(), &["UF SEDE NÃO INFORMADO", "RJ"]);
    }

    #[test]
    fn test_empty_bytes_fail() {
        assert!(matches!(normalize(b""), Err(NormalizeError::EmptySource)));
    }
}
