//! Conversation construction for item extraction

use medex_domain::ChatMessage;

const ITEM_INSTRUCTIONS: &str = "Analise o item recebido para categorizar e extrair entidades de \
medicamentos/materiais. Responda SOMENTE no JSON do schema.";

const LIST_INSTRUCTIONS: &str = "Analisar cada item listado abaixo para categorizar e extrair \
entidades de medicamentos/materiais. Responda SOMENTE no JSON do schema para cada item, \
mantendo a ordem.";

/// Builds the two-turn conversation for a single item
///
/// The item text is passed through verbatim as the user turn.
pub fn item_conversation(item: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(ITEM_INSTRUCTIONS), ChatMessage::user(item)]
}

/// Builds one conversation covering every item, joined by newlines
pub fn list_conversation<S: AsRef<str>>(items: &[S]) -> Vec<ChatMessage> {
    let joined = items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    vec![ChatMessage::system(LIST_INSTRUCTIONS), ChatMessage::user(joined)]
}
