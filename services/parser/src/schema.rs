//! Canonical schema of the merged CVM compensation extract.
//!
//! Every canonical field lists the header spellings used by past extraction
//! runs. The table drives column resolution and documents the output
//! contract at the same time; order matters in both lists:
//! - fields are resolved in `SCHEMA` order (a raw column is claimed once)
//! - within a field, the first alias present in the raw header row wins

use serde::Serialize;

/// How a canonical column is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Monetary value, headcount or deviation. Always a finite `f64`.
    Numeric,
    /// Trimmed, upper-cased label. Never empty.
    Categorical,
    /// Fiscal reference year.
    Year,
}

/// Thematic grouping mirrored from the "Formulário de Referência" layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureBlock {
    Identification,
    /// Equity-based compensation recognised in the fiscal year.
    EquityBased,
    /// Highest / mean / lowest individual compensation per governing body.
    IndividualStats,
    /// Total compensation split into fixed and variable components.
    TotalComponents,
    /// Bonus and profit-sharing plan ranges, targets and amounts paid.
    BonusPlr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanonicalField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub block: DisclosureBlock,
    /// Human readable label (pt-BR), used by report consumers.
    pub label: &'static str,
    /// Legacy header spellings, in precedence order.
    pub aliases: &'static [&'static str],
}

impl CanonicalField {
    /// Placeholder for a categorical field the source never provided,
    /// e.g. `SETOR ATIVIDADE NÃO INFORMADO`.
    pub fn sentinel(&self) -> String {
        format!("{} NÃO INFORMADO", self.name.replace('_', " "))
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == FieldKind::Numeric
    }
}

pub const NOME_COMPANHIA: &str = "NOME_COMPANHIA";
pub const ANO_REFER: &str = "ANO_REFER";
pub const ORGAO_ADMINISTRACAO: &str = "ORGAO_ADMINISTRACAO";
pub const SETOR_ATIVIDADE: &str = "SETOR_ATIVIDADE";
pub const CONTROLE_ACIONARIO: &str = "CONTROLE_ACIONARIO";
pub const UF_SEDE: &str = "UF_SEDE";

/// Zero-based column adopted as `SETOR_ATIVIDADE` when no alias matches.
///
/// Tied to one generation of the extraction layout (42+ columns with the
/// sector in position 42). A layout that keeps the width but moves the
/// column gets mis-assigned; every use is logged as a warning.
///
/// The column is never adopted unconditionally: the fallback is skipped when
/// the column at this offset already resolved to another canonical field by
/// name, and `NormalizeWarning::PositionalFallbackSkipped` records the skip.
pub const SECTOR_FALLBACK_OFFSET: usize = 41;

macro_rules! field {
    ($name:expr, $kind:ident, $block:ident, $label:expr, [$($alias:expr),* $(,)?]) => {
        CanonicalField {
            name: $name,
            kind: FieldKind::$kind,
            block: DisclosureBlock::$block,
            label: $label,
            aliases: &[$($alias),*],
        }
    };
}

pub static SCHEMA: &[CanonicalField] = &[
    // Identification
    field!(NOME_COMPANHIA, Categorical, Identification, "Companhia", ["DENOM_CIA"]),
    field!(ANO_REFER, Year, Identification, "Ano", ["Ano do Exercício Social"]),
    field!(
        ORGAO_ADMINISTRACAO,
        Categorical,
        Identification,
        "Órgão de Administração",
        ["Orgao_Administracao"]
    ),
    field!(
        SETOR_ATIVIDADE,
        Categorical,
        Identification,
        "Setor de Atividade",
        ["SETOR_DE_ATIVDADE", "Setor de ativdade", "Setor de Atividade", "SETOR", "ATIVIDADE"]
    ),
    field!(CONTROLE_ACIONARIO, Categorical, Identification, "Controle Acionário", ["CONTROLE_ACIONARIO"]),
    field!(UF_SEDE, Categorical, Identification, "UF da Sede", ["UF_SEDE"]),
    // Block A: equity-based compensation
    field!(
        "NUM_MEMBROS_ACOES",
        Numeric,
        EquityBased,
        "Membros Remunerados com Ações",
        ["Quantidade_Membros_Remunerados_Com_Acoes_Opcoes"]
    ),
    field!(
        "VALOR_OPCOES_EXERCIDAS",
        Numeric,
        EquityBased,
        "Opções Exercidas",
        ["Valor_Total_Opcoes_Acoes_Exercidas_Reconhecidas_Resultado_Exercicio"]
    ),
    field!(
        "VALOR_ACOES_RESTRITAS",
        Numeric,
        EquityBased,
        "Ações Restritas",
        ["Valor_Total_Acoes_Restritas_Entregues_Reconhecidas_Resultado_Exercicio"]
    ),
    field!(
        "VALOR_OUTROS_PLANOS_ACOES",
        Numeric,
        EquityBased,
        "Outros Planos de Ações",
        ["Valor_Total_Outros_Planos_Baseados_Acoes_Reconhecidos_Resultado_Exercicio"]
    ),
    field!(
        "TOTAL_REM_ACOES_BLOCO1",
        Numeric,
        EquityBased,
        "Total Baseado em Ações",
        ["Valor_Total_Remuneracao_Baseada_Acoes_Reconhecida_Resultado_Exercicio"]
    ),
    // Block B: individual compensation (max / mean / min)
    field!(
        "NUM_MEMBROS_INDIVIDUAL",
        Numeric,
        IndividualStats,
        "Membros do Órgão",
        ["Quantidade_Membros_Orgao_Remuneracao_Individual"]
    ),
    field!(
        "REM_MAXIMA_INDIVIDUAL",
        Numeric,
        IndividualStats,
        "Remuneração Máxima",
        [
            "Valor_Maior_Remuneracao_Individual_Reconhecida_Exercicio",
            "Valor_Maior_Remuneracao_Individual",
            "REMUNERACAO_MAXIMA",
            "VALOR_MAIOR_REMUNERACAO",
        ]
    ),
    field!(
        "REM_MEDIA_INDIVIDUAL",
        Numeric,
        IndividualStats,
        "Remuneração Média",
        [
            "Valor_Medio_Remuneracao_Individual_Reconhecida_Exercicio",
            "Valor_Medio_Remuneracao_Individual",
            "REMUNERACAO_MEDIA",
            "VALOR_MEDIO_REMUNERACAO",
        ]
    ),
    field!(
        "REM_MINIMA_INDIVIDUAL",
        Numeric,
        IndividualStats,
        "Remuneração Mínima",
        [
            "Valor_Menor_Remuneracao_Individual_Reconhecida_Exercicio",
            "Valor_Menor_Remuneracao_Individual",
            "REMUNERACAO_MINIMA",
            "VALOR_MENOR_REMUNERACAO",
        ]
    ),
    field!(
        "DESVIO_PADRAO_INDIVIDUAL",
        Numeric,
        IndividualStats,
        "Desvio Padrão",
        ["Desvio_Padrao_Remuneracao_Individual_Reconhecida_Exercicio", "DESVIO_PADRAO"]
    ),
    // Block C: total compensation components
    field!(
        "NUM_MEMBROS_TOTAL",
        Numeric,
        TotalComponents,
        "Membros Remunerados",
        ["Quantidade_Total_Membros_Remunerados_Orgao", "QTD_MEMBROS_REMUNERADOS_TOTAL"]
    ),
    field!("REM_FIXA_SALARIO", Numeric, TotalComponents, "Salário", ["SALARIO"]),
    field!("REM_FIXA_BENEFICIOS", Numeric, TotalComponents, "Benefícios", ["BENEFICIOS_DIRETOS_INDIRETOS"]),
    field!("REM_FIXA_COMITES", Numeric, TotalComponents, "Comitês", ["PARTICIPACOES_COMITES"]),
    field!("REM_FIXA_OUTROS", Numeric, TotalComponents, "Outros", ["OUTROS_VALORES_FIXOS"]),
    field!("REM_VAR_BONUS", Numeric, TotalComponents, "Bônus", ["BONUS"]),
    field!("REM_VAR_PLR", Numeric, TotalComponents, "PLR", ["PARTICIPACAO_RESULTADOS"]),
    field!("REM_VAR_REUNIOES", Numeric, TotalComponents, "Reuniões", ["PARTICIPACAO_REUNIOES"]),
    field!("REM_VAR_COMISSOES", Numeric, TotalComponents, "Comissões", ["COMISSOES"]),
    field!("REM_VAR_OUTROS", Numeric, TotalComponents, "Outros Variáveis", ["OUTROS_VALORES_VARIAVEIS"]),
    field!("REM_POS_EMPREGO", Numeric, TotalComponents, "Pós-Emprego", ["POS_EMPREGO"]),
    field!("REM_CESSACAO_CARGO", Numeric, TotalComponents, "Cessação", ["CESSACAO_CARGO"]),
    field!("REM_ACOES_BLOCO3", Numeric, TotalComponents, "Ações", ["BASEADA_ACOES"]),
    field!(
        "TOTAL_REMUNERACAO_ORGAO",
        Numeric,
        TotalComponents,
        "Remuneração Total do Órgão",
        ["TOTAL_REMUNERACAO_ORGAO"]
    ),
    // Block D: bonus and profit-sharing plans
    field!(
        "NUM_MEMBROS_BONUS_PLR",
        Numeric,
        BonusPlr,
        "Membros com Remuneração Variável",
        ["QTD_MEMBROS_REMUNERADOS_VARIAVEL"]
    ),
    field!("BONUS_MIN", Numeric, BonusPlr, "Bônus Mínimo", ["BONUS_VALOR_MINIMO"]),
    field!("BONUS_MAX", Numeric, BonusPlr, "Bônus Máximo", ["BONUS_VALOR_MAXIMO"]),
    field!("BONUS_ALVO", Numeric, BonusPlr, "Bônus Alvo", ["BONUS_VALOR_METAS_ATINGIDAS"]),
    field!("BONUS_PAGO", Numeric, BonusPlr, "Bônus Pago", ["BONUS_VALOR_EFETIVO"]),
    field!("PLR_MIN", Numeric, BonusPlr, "PLR Mínimo", ["PARTICIPACAO_VALOR_MINIMO"]),
    field!("PLR_MAX", Numeric, BonusPlr, "PLR Máximo", ["PARTICIPACAO_VALOR_MAXIMO"]),
    field!("PLR_ALVO", Numeric, BonusPlr, "PLR Alvo", ["PARTICIPACAO_VALOR_METAS_ATINGIDAS"]),
    field!("PLR_PAGO", Numeric, BonusPlr, "PLR Pago", ["PARTICIPACAO_VALOR_EFETIVO"]),
];

/// Look up a canonical field by its canonical name.
pub fn field(name: &str) -> Option<&'static CanonicalField> {
    SCHEMA.iter().find(|f| f.name == name)
}

pub fn fields_of_kind(kind: FieldKind) -> impl Iterator<Item = &'static CanonicalField> {
    SCHEMA.iter().filter(move |f| f.kind == kind)
}

pub fn fields_in_block(block: DisclosureBlock) -> impl Iterator<Item = &'static CanonicalField> {
    SCHEMA.iter().filter(move |f| f.block == block)
}
