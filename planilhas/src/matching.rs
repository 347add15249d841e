//! Comparação de cabeçalhos tolerante a acentos, caixa e pontuação

use deunicode::deunicode;
use strsim::jaro_winkler;

/// Similaridade mínima para sugerir um cabeçalho parecido em mensagens de erro
const SUGGESTION_THRESHOLD: f64 = 0.80;

/// Normaliza um cabeçalho para comparação
///
/// - Remove acentos (deunicode)
/// - Converte para lowercase
/// - Troca pontuação por espaço e colapsa espaços
///
/// # Exemplos
///
/// ```
/// use planilhas::matching::normalize_header;
///
/// assert_eq!(normalize_header("  Conferido? "), "conferido");
/// assert_eq!(normalize_header("Forma de  Pagamento"), "forma de pagamento");
/// assert_eq!(normalize_header("SERVIÇO"), "servico");
/// ```
pub fn normalize_header(header: &str) -> String {
    deunicode(header)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Verifica se dois cabeçalhos são o mesmo após normalização
pub fn same_header(a: &str, b: &str) -> bool {
    let a = normalize_header(a);
    !a.is_empty() && a == normalize_header(b)
}

/// Encontra o cabeçalho mais parecido (Jaro-Winkler) para usar como dica
///
/// Retorna `None` quando nada passa do limiar.
pub fn closest_header<'a>(wanted: &str, headers: &'a [String]) -> Option<(&'a str, f64)> {
    let wanted = normalize_header(wanted);
    headers
        .iter()
        .map(|h| (h.as_str(), jaro_winkler(&wanted, &normalize_header(h))))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
