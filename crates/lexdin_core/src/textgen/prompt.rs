//! Prompt construction for change summaries.

/// Builds the legal-analyst prompt asking for a summary of the changes the
/// modifying norm introduces into the base norm.
pub fn build_summary_prompt(base_text: &str, modifying_text: &str) -> String {
    format!(
        "Eres un asistente legal experto en análisis normativo. A continuación se presenta \
el texto de una norma base y el texto de una norma que la modifica.\n\
Genera un resumen conciso y preciso de los cambios introducidos por la norma modificatoria.\n\
\n\
NORMA BASE:\n\
---\n\
{base}\n\
---\n\
\n\
NORMA MODIFICATORIA:\n\
---\n\
{modifying}\n\
---\n\
\n\
Proporciona un resumen claro de las modificaciones.",
        base = base_text.trim(),
        modifying = modifying_text.trim(),
    )
}
