//! Funções de normalização dos valores digitados na planilha
//!
//! Nomes de cliente, datas e valores chegam como texto livre: acentos e
//! espaços variam, datas vêm no formato brasileiro (dia primeiro) e valores
//! monetários com vírgula decimal. Tudo que não puder ser interpretado vira
//! `None` e fica fora do casamento de linhas, sem derrubar o lote.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Valores aceitos como "sim" na coluna de conferência/exportação
const AFFIRMATIVE: &[&str] = &["sim", "s", "yes", "y", "true", "1", "x", "ok", "conferido", "exportado"];

/// Milhar com ponto: 1.234 / 12.345.678 (sem parte decimal)
static THOUSANDS_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{3})+$").expect("valid regex"));

/// Remove acentos, converte para lowercase, remove espaços extras e caracteres especiais
/// usando NFKD (Normalization Form Compatibility Decomposition)
///
/// É idempotente: `normalize_string(normalize_string(x)) == normalize_string(x)`.
///
/// # Exemplos
/// ```
/// use salao_dashboard::utils::normalization::normalize_string;
///
/// assert_eq!(normalize_string("Ana Silva"), "ana silva");
/// assert_eq!(normalize_string("  ana   SILVA  "), "ana silva");
/// assert_eq!(normalize_string("Conceição D'Ávila"), "conceicao davila");
/// ```
pub fn normalize_string(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interpreta datas no padrão brasileiro, tolerante a variações de digitação
///
/// Aceita `dd/mm/aaaa`, `d/m/aa`, `dd-mm-aaaa`, `dd.mm.aaaa`, ISO `aaaa-mm-dd`
/// e qualquer um deles seguido de horário. Dia/mês inválidos (ex.: 31/04)
/// resultam em `None`.
///
/// # Exemplos
/// ```
/// use chrono::NaiveDate;
/// use salao_dashboard::utils::normalization::parse_date;
///
/// assert_eq!(parse_date("01/05/2024"), NaiveDate::from_ymd_opt(2024, 5, 1));
/// assert_eq!(parse_date("2024-05-01"), NaiveDate::from_ymd_opt(2024, 5, 1));
/// assert_eq!(parse_date("31/04/2024"), None);
/// ```
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.trim().split(|c: char| c.is_whitespace() || c == 'T').next()?;
    let parts: Vec<&str> = token.split(['/', '-', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    let year: i32 = match year.len() {
        2 => {
            let yy: i32 = year.parse().ok()?;
            if yy < 70 {
                2000 + yy
            } else {
                1900 + yy
            }
        }
        4 => year.parse().ok()?,
        _ => return None,
    };
    if month.len() > 2 || day.len() > 2 {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Formata data no padrão usado na planilha (`dd/mm/aaaa`)
pub fn format_date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Interpreta valores monetários: `R$ 1.234,56`, `1234,56`, `1234.56`, `-80`, `(80,00)`
///
/// # Exemplos
/// ```
/// use salao_dashboard::utils::normalization::parse_currency;
///
/// assert_eq!(parse_currency("R$ 1.234,56"), Some(1234.56));
/// assert_eq!(parse_currency("80"), Some(80.0));
/// assert_eq!(parse_currency("abc"), None);
/// ```
pub fn parse_currency(raw: &str) -> Option<f64> {
    let mut cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut negative = false;
    if cleaned.starts_with('(') && cleaned.ends_with(')') {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = !negative;
        cleaned = rest.to_string();
    }

    let number = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if THOUSANDS_DOT.is_match(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };

    if !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Valor com duas casas e vírgula decimal, sem separador de milhar (`1234,50`)
pub fn format_decimal_br(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}

/// Verifica se o valor da célula representa "sim"
pub fn is_affirmative(raw: &str) -> bool {
    let normalized = normalize_string(raw);
    AFFIRMATIVE.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;

    #[test]
    fn test_normalize_string_nfkd() {
        assert_eq!(normalize_string("Ana Silva"), "ana silva");
        assert_eq!(normalize_string("ana   silva"), "ana silva");
        assert_eq!(normalize_string("  João & Silva Ltda. "), "joao silva ltda");
        assert_eq!(normalize_string("Escova + Hidratação"), "escova hidratacao");
        assert_eq!(normalize_string("FRANÇOISE"), "francoise");
        assert_eq!(normalize_string(""), "");
    }

    #[test]
    fn test_normalize_string_is_idempotent() {
        let alphabet: Vec<char> = "aáàâãeéêiíoóôõuúüçñAÁÉÍÓÚÇ Ñß'-.&/123\t\u{a0}İǄﬁ".chars().collect();
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let len = rng.gen_range(0..24);
            let input: String = (0..len).map(|_| *alphabet.choose(&mut rng).unwrap()).collect();
            let once = normalize_string(&input);
            assert_eq!(normalize_string(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let may_first = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(parse_date("01/05/2024"), may_first);
        assert_eq!(parse_date("1/5/2024"), may_first);
        assert_eq!(parse_date("01/05/24"), may_first);
        assert_eq!(parse_date("01-05-2024"), may_first);
        assert_eq!(parse_date("01.05.2024"), may_first);
        assert_eq!(parse_date("2024-05-01"), may_first);
        assert_eq!(parse_date("01/05/2024 14:30"), may_first);
        assert_eq!(parse_date("2024-05-01T10:00:00"), may_first);
        assert_eq!(parse_date(" 01/05/2024 "), may_first);
    }

    #[test]
    fn test_parse_date_day_first() {
        // 05/01 é 5 de janeiro, nunca 1º de maio
        assert_eq!(parse_date("05/01/2024"), NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(parse_date("13/12/2024"), NaiveDate::from_ymd_opt(2024, 12, 13));
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date("31/04/2024"), None);
        assert_eq!(parse_date("29/02/2023"), None);
        assert_eq!(parse_date("12/13/2024"), None);
        assert_eq!(parse_date("amanhã"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("01/05"), None);
        assert_eq!(parse_date("01/05/202"), None);
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_currency("R$\u{a0}80,00"), Some(80.0));
        assert_eq!(parse_currency("1234,5"), Some(1234.5));
        assert_eq!(parse_currency("1234.56"), Some(1234.56));
        assert_eq!(parse_currency("1.500"), Some(1500.0));
        assert_eq!(parse_currency("-35,90"), Some(-35.9));
        assert_eq!(parse_currency("(35,90)"), Some(-35.9));
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("grátis"), None);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_decimal_br(1234.5), "1234,50");
        assert_eq!(format_decimal_br(0.0), "0,00");
        assert_eq!(format_date_br(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()), "01/05/2024");
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("sim"));
        assert!(is_affirmative(" SIM "));
        assert!(is_affirmative("Conferido"));
        assert!(is_affirmative("x"));
        assert!(!is_affirmative("não"));
        assert!(!is_affirmative("nao"));
        assert!(!is_affirmative(""));
    }
}
