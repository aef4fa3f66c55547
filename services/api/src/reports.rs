//! Report queries over the canonical table.
//!
//! Every function is pure and takes a [`Selection`] that already carries the
//! global filter. An empty selection yields an empty result, never an error;
//! errors are reserved for parameters that name no known metric.

use std::collections::BTreeMap;

use cvm_parser::schema::{self, CONTROLE_ACIONARIO, NOME_COMPANHIA, ORGAO_ADMINISTRACAO, SETOR_ATIVIDADE, UF_SEDE};
use cvm_parser::Selection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Components of total pay, in display order.
pub const COMPONENTS: &[&str] = &[
    "REM_FIXA_SALARIO",
    "REM_FIXA_BENEFICIOS",
    "REM_FIXA_COMITES",
    "REM_VAR_BONUS",
    "REM_VAR_PLR",
    "REM_VAR_COMISSOES",
    "REM_POS_EMPREGO",
    "REM_CESSACAO_CARGO",
    "REM_ACOES_BLOCO3",
    "REM_FIXA_OUTROS",
];

pub const BENCHMARK_COMPONENTS: &[&str] = &[
    "REM_FIXA_SALARIO",
    "REM_FIXA_BENEFICIOS",
    "REM_VAR_BONUS",
    "REM_VAR_PLR",
    "REM_ACOES_BLOCO3",
    "REM_FIXA_OUTROS",
];

pub const BONUS_METRICS: &[&str] = &[
    "BONUS_MIN",
    "BONUS_ALVO",
    "BONUS_MAX",
    "BONUS_PAGO",
    "PLR_MIN",
    "PLR_ALVO",
    "PLR_MAX",
    "PLR_PAGO",
];

/// Body total plus each component, for the component ranking.
pub const COMPONENT_RANKING_METRICS: &[&str] = &[
    "TOTAL_REMUNERACAO_ORGAO",
    "REM_FIXA_SALARIO",
    "REM_FIXA_BENEFICIOS",
    "REM_FIXA_COMITES",
    "REM_VAR_BONUS",
    "REM_VAR_PLR",
    "REM_VAR_COMISSOES",
    "REM_POS_EMPREGO",
    "REM_CESSACAO_CARGO",
    "REM_ACOES_BLOCO3",
    "REM_FIXA_OUTROS",
];

pub const INDIVIDUAL_METRICS: &[&str] = &["REM_MAXIMA_INDIVIDUAL", "REM_MEDIA_INDIVIDUAL", "REM_MINIMA_INDIVIDUAL"];

pub const STATISTIC_METRICS: &[&str] = &[
    "REM_MAXIMA_INDIVIDUAL",
    "REM_MEDIA_INDIVIDUAL",
    "REM_MINIMA_INDIVIDUAL",
    "TOTAL_REMUNERACAO_ORGAO",
    "REM_FIXA_SALARIO",
    "BONUS_PAGO",
];

const MEMBERS_TOTAL: &str = "NUM_MEMBROS_TOTAL";
const MEMBERS_INDIVIDUAL: &str = "NUM_MEMBROS_INDIVIDUAL";
const MEMBERS_BONUS_PLR: &str = "NUM_MEMBROS_BONUS_PLR";
const MEMBERS_EQUITY: &str = "NUM_MEMBROS_ACOES";
const EXECUTIVE_BOARD: &str = "DIRETORIA";
const BOARD_OF_DIRECTORS: &str = "CONSELHO";
const BODY_TOTAL: &str = "TOTAL_REMUNERACAO_ORGAO";
const EQUITY_TOTAL: &str = "TOTAL_REM_ACOES_BLOCO1";
const SEVERANCE_FIELDS: [&str; 2] = ["REM_CESSACAO_CARGO", "REM_POS_EMPREGO"];

pub const DEFAULT_LIMIT: usize = 15;
pub const EQUITY_RANKING_LIMIT: usize = 10;
/// Severance must exceed this share of the body total to be flagged.
pub const SEVERANCE_THRESHOLD_PCT: f64 = 1.0;
pub const ADJUSTMENT_RANGE: (f64, f64) = (-50.0, 100.0);

#[derive(Error, Debug, PartialEq)]
pub enum ReportError {
    #[error("unknown metric '{metric}', expected one of: {}", allowed.join(", "))]
    UnknownMetric {
        metric: String,
        allowed: &'static [&'static str],
    },

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

fn check_metric(metric: &str, allowed: &'static [&'static str]) -> Result<&'static str, ReportError> {
    allowed
        .iter()
        .copied()
        .find(|m| *m == metric)
        .ok_or_else(|| ReportError::UnknownMetric {
            metric: metric.to_string(),
            allowed,
        })
}

fn label(field: &'static str) -> &'static str {
    schema::field(field).map_or(field, |f| f.label)
}

// ============================================================================
// Global filter
// ============================================================================

/// Region, sector and control filters shared by every report.
/// `TODAS` / `TODOS` / empty mean "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalFilter {
    pub uf: Option<String>,
    pub setor: Option<String>,
    pub controle: Option<String>,
}

impl GlobalFilter {
    pub fn apply<'a>(&self, selection: &Selection<'a>) -> Selection<'a> {
        let mut filtered = selection.clone();
        for (field, value) in [
            (UF_SEDE, &self.uf),
            (SETOR_ATIVIDADE, &self.setor),
            (CONTROLE_ACIONARIO, &self.controle),
        ] {
            if let Some(wanted) = value.as_deref().and_then(active_filter) {
                filtered = filtered.where_eq(field, &wanted);
            }
        }
        filtered
    }
}

fn active_filter(raw: &str) -> Option<String> {
    let value = raw.trim().to_uppercase();
    match value.as_str() {
        "" | "TODAS" | "TODOS" => None,
        _ => Some(value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    #[default]
    Total,
    PerMember,
}

// ============================================================================
// Filter options
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub ufs: Vec<String>,
    pub setores: Vec<String>,
    pub controles: Vec<String>,
    pub orgaos: Vec<String>,
    pub companies: Vec<String>,
    /// Most recent first.
    pub years: Vec<i32>,
}

pub fn filter_options(selection: &Selection<'_>) -> FilterOptions {
    let mut years = selection.years();
    years.reverse();
    FilterOptions {
        ufs: selection.distinct(UF_SEDE),
        setores: selection.distinct(SETOR_ATIVIDADE),
        controles: selection.distinct(CONTROLE_ACIONARIO),
        orgaos: selection.distinct(ORGAO_ADMINISTRACAO),
        companies: selection.distinct(NOME_COMPANHIA),
        years,
    }
}

// ============================================================================
// Component breakdown
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentValue {
    pub component: &'static str,
    pub field: &'static str,
    pub value: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyComposition {
    pub orgao: String,
    pub total: f64,
    pub components: Vec<ComponentValue>,
}

/// Sum of the components over `rows` divided by `divisor`, with the
/// positive ones and their share. `None` when the total is not positive.
fn composition(rows: &Selection<'_>, divisor: f64) -> Option<(f64, Vec<ComponentValue>)> {
    let sums: Vec<(&'static str, f64)> = COMPONENTS.iter().map(|&f| (f, rows.sum(f) / divisor)).collect();
    let total: f64 = sums.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return None;
    }
    let components = sums
        .into_iter()
        .filter(|(_, value)| *value > 0.0)
        .map(|(field, value)| ComponentValue {
            component: label(field),
            field,
            value,
            share_pct: value / total * 100.0,
        })
        .collect();
    Some((total, components))
}

/// Pay composition of each governing body of one company in one year.
pub fn component_breakdown(selection: &Selection<'_>, empresa: &str, ano: i32) -> Vec<BodyComposition> {
    let company = selection.where_eq(NOME_COMPANHIA, empresa).where_year(ano);

    company
        .group_by(ORGAO_ADMINISTRACAO)
        .into_iter()
        .filter_map(|(orgao, rows)| {
            composition(&rows, 1.0).map(|(total, components)| BodyComposition {
                orgao,
                total,
                components,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentYear {
    pub ano: i32,
    pub members: f64,
    pub total: f64,
    pub components: Vec<ComponentValue>,
}

/// Component history of one company and body. In per-member mode each
/// year is divided by its total headcount; years without members are skipped.
pub fn component_evolution(selection: &Selection<'_>, empresa: &str, orgao: &str, basis: Basis) -> Vec<ComponentYear> {
    let rows = selection
        .where_eq(NOME_COMPANHIA, empresa)
        .where_eq(ORGAO_ADMINISTRACAO, orgao);

    let mut out = Vec::new();
    for (ano, year_rows) in rows.group_by_year() {
        let members = year_rows.first(MEMBERS_TOTAL);
        let divisor = match basis {
            Basis::Total => 1.0,
            Basis::PerMember if members > 0.0 => members,
            Basis::PerMember => continue,
        };
        if let Some((total, components)) = composition(&year_rows, divisor) {
            out.push(ComponentYear {
                ano,
                members,
                total,
                components,
            });
        }
    }
    out
}

/// Companies ranked by one component (or the body total) for a body and year.
pub fn component_ranking(
    selection: &Selection<'_>,
    ano: i32,
    orgao: &str,
    metric: &str,
    basis: Basis,
    limit: usize,
) -> Result<Vec<RankedCompany>, ReportError> {
    let metric = check_metric(metric, COMPONENT_RANKING_METRICS)?;
    let rows = selection.where_year(ano).where_eq(ORGAO_ADMINISTRACAO, orgao);
    Ok(rank_companies(&rows, metric, MEMBERS_TOTAL, basis, limit))
}

// ============================================================================
// Bonus and profit sharing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub metric: &'static str,
    pub field: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusYear {
    pub ano: i32,
    pub members: f64,
    pub metrics: Vec<MetricValue>,
    pub bonus_paid_vs_target_pct: Option<f64>,
    pub plr_paid_vs_target_pct: Option<f64>,
    pub bonus_max_vs_target_pct: Option<f64>,
    pub plr_max_vs_target_pct: Option<f64>,
}

fn pct_of_target(value: f64, target: f64) -> Option<f64> {
    (target > 0.0).then(|| value / target * 100.0)
}

pub fn bonus_evolution(selection: &Selection<'_>, empresa: &str, orgao: &str, basis: Basis) -> Vec<BonusYear> {
    let rows = selection
        .where_eq(NOME_COMPANHIA, empresa)
        .where_eq(ORGAO_ADMINISTRACAO, orgao);

    let mut out = Vec::new();
    for (ano, year_rows) in rows.group_by_year() {
        let members = year_rows.first(MEMBERS_BONUS_PLR);
        let divisor = match basis {
            Basis::Total => 1.0,
            Basis::PerMember if members > 0.0 => members,
            Basis::PerMember => continue,
        };
        let value = |field: &str| year_rows.sum(field) / divisor;

        out.push(BonusYear {
            ano,
            members,
            metrics: BONUS_METRICS
                .iter()
                .map(|&field| MetricValue {
                    metric: label(field),
                    field,
                    value: value(field),
                })
                .collect(),
            bonus_paid_vs_target_pct: pct_of_target(value("BONUS_PAGO"), value("BONUS_ALVO")),
            plr_paid_vs_target_pct: pct_of_target(value("PLR_PAGO"), value("PLR_ALVO")),
            bonus_max_vs_target_pct: pct_of_target(value("BONUS_MAX"), value("BONUS_ALVO")),
            plr_max_vs_target_pct: pct_of_target(value("PLR_MAX"), value("PLR_ALVO")),
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCompany {
    pub company: String,
    pub value: f64,
    /// Headcount used as divisor in per-member rankings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<f64>,
}

/// Highest first; ties by company name. Non-positive values are dropped.
fn top(mut ranked: Vec<RankedCompany>, limit: usize) -> Vec<RankedCompany> {
    ranked.retain(|r| r.value > 0.0);
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.company.cmp(&b.company)));
    ranked.truncate(limit);
    ranked
}

/// One entry per company: `metric` summed over its rows, divided in
/// per-member mode by the first `members_field` value. Companies without
/// members are left out of per-member rankings.
fn rank_companies(
    rows: &Selection<'_>,
    metric: &str,
    members_field: &str,
    basis: Basis,
    limit: usize,
) -> Vec<RankedCompany> {
    let ranked = rows
        .group_by(NOME_COMPANHIA)
        .into_iter()
        .filter_map(|(company, rows)| {
            let total = rows.sum(metric);
            match basis {
                Basis::Total => Some(RankedCompany {
                    company,
                    value: total,
                    members: None,
                }),
                Basis::PerMember => {
                    let members = rows.first(members_field);
                    (members > 0.0).then(|| RankedCompany {
                        company,
                        value: total / members,
                        members: Some(members),
                    })
                }
            }
        })
        .collect();

    top(ranked, limit)
}

pub fn bonus_ranking(
    selection: &Selection<'_>,
    ano: i32,
    metric: &str,
    basis: Basis,
    limit: usize,
) -> Result<Vec<RankedCompany>, ReportError> {
    let metric = check_metric(metric, BONUS_METRICS)?;
    Ok(rank_companies(&selection.where_year(ano), metric, MEMBERS_BONUS_PLR, basis, limit))
}

// ============================================================================
// Share-based pay
// ============================================================================

/// Share-based pay recognized in the year, summed over every body.
/// Per-member values use the headcount holding shares or options.
pub fn equity_ranking(selection: &Selection<'_>, ano: i32, basis: Basis, limit: usize) -> Vec<RankedCompany> {
    rank_companies(&selection.where_year(ano), EQUITY_TOTAL, MEMBERS_EQUITY, basis, limit)
}

// ============================================================================
// Individual pay
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualYear {
    pub ano: i32,
    pub maxima: f64,
    pub media: f64,
    pub minima: f64,
}

/// Max / mean / min individual pay per year. One disclosure row per
/// company, body and year is expected; the first one wins otherwise.
pub fn individual_evolution(selection: &Selection<'_>, empresa: &str, orgao: &str) -> Vec<IndividualYear> {
    selection
        .where_eq(NOME_COMPANHIA, empresa)
        .where_eq(ORGAO_ADMINISTRACAO, orgao)
        .group_by_year()
        .into_iter()
        .map(|(ano, rows)| IndividualYear {
            ano,
            maxima: rows.first("REM_MAXIMA_INDIVIDUAL"),
            media: rows.first("REM_MEDIA_INDIVIDUAL"),
            minima: rows.first("REM_MINIMA_INDIVIDUAL"),
        })
        .filter(|y| y.maxima > 0.0 || y.media > 0.0 || y.minima > 0.0)
        .collect()
}

pub fn individual_ranking(
    selection: &Selection<'_>,
    ano: i32,
    orgao: &str,
    metric: &str,
    limit: usize,
) -> Result<Vec<RankedCompany>, ReportError> {
    let metric = check_metric(metric, INDIVIDUAL_METRICS)?;

    let ranked = selection
        .where_year(ano)
        .where_eq(ORGAO_ADMINISTRACAO, orgao)
        .rows()
        .map(|row| RankedCompany {
            company: row.text(NOME_COMPANHIA).to_string(),
            value: row.num(metric),
            members: None,
        })
        .collect();

    Ok(top(ranked, limit))
}

// ============================================================================
// Sector statistics
// ============================================================================

/// Descriptive statistics of a sample, quartiles by linear interpolation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single value.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std_dev = (n > 1).then(|| {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        });

        Some(Self {
            count: n,
            mean,
            std_dev,
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        })
    }
}

/// `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStats {
    pub setor: String,
    #[serde(flatten)]
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStatistics {
    pub metric: &'static str,
    pub basis: Basis,
    pub members_field: &'static str,
    pub sectors: Vec<SectorStats>,
    pub overall: Option<Summary>,
}

/// Headcount a metric is divided by in per-member mode.
pub fn members_field_for(metric: &str) -> &'static str {
    match metric {
        "BONUS_PAGO" => MEMBERS_BONUS_PLR,
        "REM_MAXIMA_INDIVIDUAL" | "REM_MEDIA_INDIVIDUAL" | "REM_MINIMA_INDIVIDUAL" => MEMBERS_INDIVIDUAL,
        _ => MEMBERS_TOTAL,
    }
}

pub fn sector_statistics(
    selection: &Selection<'_>,
    ano: i32,
    orgao: &str,
    metric: &str,
    basis: Basis,
) -> Result<SectorStatistics, ReportError> {
    let metric = check_metric(metric, STATISTIC_METRICS)?;
    let members_field = members_field_for(metric);

    let mut by_sector: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut all = Vec::new();
    for row in selection.where_year(ano).where_eq(ORGAO_ADMINISTRACAO, orgao).rows() {
        let value = match basis {
            Basis::Total => row.num(metric),
            Basis::PerMember => {
                let members = row.num(members_field);
                if members <= 0.0 {
                    continue;
                }
                row.num(metric) / members
            }
        };
        if value > 0.0 {
            by_sector.entry(row.text(SETOR_ATIVIDADE).to_string()).or_default().push(value);
            all.push(value);
        }
    }

    let sectors = by_sector
        .into_iter()
        .filter_map(|(setor, values)| Summary::of(&values).map(|summary| SectorStats { setor, summary }))
        .collect();

    Ok(SectorStatistics {
        metric,
        basis,
        members_field,
        sectors,
        overall: Summary::of(&all),
    })
}

// ============================================================================
// Peer benchmark
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Base,
    Peer,
    PeerMean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkPoint {
    pub ano: i32,
    pub component: &'static str,
    pub field: &'static str,
    pub value: f64,
    pub projected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkSeries {
    pub name: String,
    pub kind: SeriesKind,
    pub points: Vec<BenchmarkPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmark {
    pub orgao: String,
    pub years: Vec<i32>,
    pub projection_year: Option<i32>,
    pub adjustment_pct: f64,
    pub series: Vec<BenchmarkSeries>,
}

/// Component history of a base company and its peers for one governing
/// body, with a one-year projection: the base repeats its last year, peers
/// grow by `adjustment_pct`.
pub fn peer_benchmark(
    selection: &Selection<'_>,
    empresa: &str,
    orgao: &str,
    peers: &[String],
    adjustment_pct: f64,
) -> Result<Benchmark, ReportError> {
    let (min, max) = ADJUSTMENT_RANGE;
    if !(min..=max).contains(&adjustment_pct) {
        return Err(ReportError::OutOfRange {
            name: "adjustment_pct",
            value: adjustment_pct,
            min,
            max,
        });
    }

    let mut peer_names: Vec<String> = Vec::new();
    for peer in peers {
        let peer = peer.trim().to_uppercase();
        if !peer.is_empty() && peer != empresa && !peer_names.contains(&peer) {
            peer_names.push(peer);
        }
    }

    let body = selection.where_eq(ORGAO_ADMINISTRACAO, orgao);
    let mut companies = vec![empresa.to_string()];
    companies.extend(peer_names.iter().cloned());
    let years = body.where_in(NOME_COMPANHIA, &companies).years();

    if years.is_empty() {
        return Ok(Benchmark {
            orgao: orgao.to_string(),
            years,
            projection_year: None,
            adjustment_pct,
            series: Vec::new(),
        });
    }
    let last = years[years.len() - 1];
    let projection = last + 1;
    let growth = 1.0 + adjustment_pct / 100.0;

    let history = |company: &str| -> Vec<BenchmarkPoint> {
        let rows = body.where_eq(NOME_COMPANHIA, company);
        years
            .iter()
            .flat_map(|&ano| {
                let year_rows = rows.where_year(ano);
                BENCHMARK_COMPONENTS.iter().map(move |&field| BenchmarkPoint {
                    ano,
                    component: label(field),
                    field,
                    value: year_rows.sum(field),
                    projected: false,
                })
            })
            .collect()
    };
    let project = |points: &mut Vec<BenchmarkPoint>, factor: f64| {
        let next: Vec<BenchmarkPoint> = points
            .iter()
            .filter(|p| p.ano == last)
            .map(|p| BenchmarkPoint {
                ano: projection,
                value: p.value * factor,
                projected: true,
                ..p.clone()
            })
            .collect();
        points.extend(next);
    };

    let mut base = history(empresa);
    project(&mut base, 1.0);
    let mut series = vec![BenchmarkSeries {
        name: empresa.to_string(),
        kind: SeriesKind::Base,
        points: base,
    }];

    let mut peer_series = Vec::new();
    for peer in &peer_names {
        let mut points = history(peer);
        project(&mut points, growth);
        peer_series.push(BenchmarkSeries {
            name: peer.clone(),
            kind: SeriesKind::Peer,
            points,
        });
    }

    if let Some(first) = peer_series.first() {
        let n = peer_series.len() as f64;
        let points = first
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| BenchmarkPoint {
                value: peer_series.iter().map(|s| s.points[i].value).sum::<f64>() / n,
                ..p.clone()
            })
            .collect();
        series.extend(peer_series);
        series.push(BenchmarkSeries {
            name: "MÉDIA DOS PARES".to_string(),
            kind: SeriesKind::PeerMean,
            points,
        });
    }

    let mut all_years = years;
    all_years.push(projection);
    Ok(Benchmark {
        orgao: orgao.to_string(),
        years: all_years,
        projection_year: Some(projection),
        adjustment_pct,
        series,
    })
}

// ============================================================================
// Pay slice
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaySliceRow {
    pub company: String,
    pub orgao: String,
    pub maxima: f64,
    pub media: f64,
    /// Highest individual pay as a multiple of the body's mean.
    pub multiple: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaySlice {
    pub ano: i32,
    pub companies: Vec<PaySliceRow>,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

/// Pay dispersion of executive boards: max over mean individual pay.
/// Statistics cover every valid row; `companies` holds the top `limit`.
pub fn pay_slice(selection: &Selection<'_>, ano: i32, limit: usize) -> PaySlice {
    let mut rows: Vec<PaySliceRow> = selection
        .where_year(ano)
        .filter(|row| row.text(ORGAO_ADMINISTRACAO).contains(EXECUTIVE_BOARD))
        .rows()
        .filter_map(|row| {
            let maxima = row.num("REM_MAXIMA_INDIVIDUAL");
            let media = row.num("REM_MEDIA_INDIVIDUAL");
            (maxima > 0.0 && media > 0.0).then(|| PaySliceRow {
                company: row.text(NOME_COMPANHIA).to_string(),
                orgao: row.text(ORGAO_ADMINISTRACAO).to_string(),
                maxima,
                media,
                multiple: maxima / media,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.multiple.total_cmp(&a.multiple).then_with(|| a.company.cmp(&b.company)));

    let multiples: Vec<f64> = rows.iter().map(|r| r.multiple).collect();
    let summary = Summary::of(&multiples);
    rows.truncate(limit);

    PaySlice {
        ano,
        count: multiples.len(),
        mean: summary.as_ref().map(|s| s.mean),
        median: summary.as_ref().map(|s| s.median),
        max: summary.as_ref().map(|s| s.max),
        companies: rows,
    }
}

// ============================================================================
// Governance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardPay {
    pub company: String,
    pub diretoria: f64,
    pub conselho: f64,
    /// Executive board total as a multiple of the board of directors total.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardBalance {
    pub ano: i32,
    pub companies: Vec<BoardPay>,
    pub ratio: Option<Summary>,
}

/// Executive and board names vary in accents and suffixes between filings.
fn standard_body(orgao: &str) -> Option<&'static str> {
    if orgao.contains(EXECUTIVE_BOARD) {
        Some(EXECUTIVE_BOARD)
    } else if orgao.contains(BOARD_OF_DIRECTORS) {
        Some(BOARD_OF_DIRECTORS)
    } else {
        None
    }
}

/// Total pay of the executive board against the board of directors, for
/// companies that disclose a positive total for both.
pub fn board_balance(selection: &Selection<'_>, ano: i32) -> BoardBalance {
    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for row in selection.where_year(ano).rows() {
        let Some(body) = standard_body(row.text(ORGAO_ADMINISTRACAO)) else {
            continue;
        };
        let entry = totals.entry(row.text(NOME_COMPANHIA).to_string()).or_default();
        if body == EXECUTIVE_BOARD {
            entry.0 += row.num(BODY_TOTAL);
        } else {
            entry.1 += row.num(BODY_TOTAL);
        }
    }

    let mut companies: Vec<BoardPay> = totals
        .into_iter()
        .filter(|(_, (diretoria, conselho))| *diretoria > 0.0 && *conselho > 0.0)
        .map(|(company, (diretoria, conselho))| BoardPay {
            company,
            diretoria,
            conselho,
            ratio: diretoria / conselho,
        })
        .collect();
    companies.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.company.cmp(&b.company)));

    let ratios: Vec<f64> = companies.iter().map(|c| c.ratio).collect();
    BoardBalance {
        ano,
        ratio: Summary::of(&ratios),
        companies,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeveranceRow {
    pub company: String,
    pub orgao: String,
    pub setor: String,
    pub total: f64,
    pub severance: f64,
    pub share_pct: f64,
}

/// Disclosures where termination and post-employment pay exceed
/// [`SEVERANCE_THRESHOLD_PCT`] of the body total, largest share first.
pub fn severance_radar(selection: &Selection<'_>, ano: i32, limit: usize) -> Vec<SeveranceRow> {
    let mut rows: Vec<SeveranceRow> = selection
        .where_year(ano)
        .rows()
        .filter_map(|row| {
            let total = row.num(BODY_TOTAL);
            if total <= 0.0 {
                return None;
            }
            let severance: f64 = SEVERANCE_FIELDS.iter().map(|f| row.num(f)).sum();
            let share_pct = severance / total * 100.0;
            (share_pct > SEVERANCE_THRESHOLD_PCT).then(|| SeveranceRow {
                company: row.text(NOME_COMPANHIA).to_string(),
                orgao: row.text(ORGAO_ADMINISTRACAO).to_string(),
                setor: row.text(SETOR_ATIVIDADE).to_string(),
                total,
                severance,
                share_pct,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.share_pct.total_cmp(&a.share_pct).then_with(|| a.company.cmp(&b.company)));
    rows.truncate(limit);
    rows
}
