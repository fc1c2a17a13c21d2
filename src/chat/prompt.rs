//! Prompt assembly for the chat advisor

use crate::db::Product;
use crate::llm::ChatMessage;

/// System persona sent with every completion request
pub const SYSTEM_PERSONA: &str = "You are a helpful cosmetics expert AI assistant.";

/// One catalog line: `name (brand, shade) - ₹price`
#[must_use]
pub fn format_product_line(product: &Product) -> String {
    let details = match product.shade.as_deref().filter(|s| !s.is_empty()) {
        Some(shade) => format!("{}, {shade}", product.brand),
        None => product.brand.clone(),
    };
    format!("{} ({details}) - ₹{}", product.name, product.price_label())
}

/// Newline-separated catalog listing
#[must_use]
pub fn format_product_list(products: &[Product]) -> String {
    products
        .iter()
        .map(format_product_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// User prompt embedding the query and the catalog listing
#[must_use]
pub fn build_prompt(query: &str, products: &[Product]) -> String {
    format!(
        "You are a cosmetics expert. User asked: \"{query}\".\n\
         Here is a list of available products:\n\
         {}\n\
         Suggest the most suitable products for the user with explanation.",
        format_product_list(products)
    )
}

/// The two-message exchange sent to the model
#[must_use]
pub fn build_messages(query: &str, products: &[Product]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PERSONA),
        ChatMessage::user(build_prompt(query, products)),
    ]
}
