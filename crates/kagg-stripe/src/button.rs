//! Checkout button markup
//!
//! Attributes come from page content (shortcode-style) and are sanitized
//! field by field; rendering itself touches neither network nor storage.

use crate::checkout::{Checkout, CurrentUser};
use crate::html::escape;
use crate::nonce::CHECKOUT_ACTION;
use crate::sanitize::{self, DEFAULT_DESCRIPTION, DEFAULT_MODE, Input};

pub const DEFAULT_LABEL: &str = "Pay Now";

/// Button attributes after sanitization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonAttributes {
    pub mode: String,
    pub price: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub label: String,
    pub custom_amount: bool,
}

impl Default for ButtonAttributes {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.into(),
            price: String::new(),
            amount: 0,
            currency: sanitize::DEFAULT_CURRENCY.into(),
            description: DEFAULT_DESCRIPTION.into(),
            label: DEFAULT_LABEL.into(),
            custom_amount: false,
        }
    }
}

impl ButtonAttributes {
    /// Read attributes, falling back to defaults for anything missing
    pub fn from_input(input: &Input) -> Self {
        Self {
            mode: input.text_or("mode", DEFAULT_MODE),
            price: input.text("price"),
            amount: input.integer("amount"),
            currency: input.currency("currency"),
            description: input.text_or("description", DEFAULT_DESCRIPTION),
            label: input.text_or("label", DEFAULT_LABEL),
            custom_amount: input.boolean("custom_amount"),
        }
    }
}

/// Checkout form for `attrs`, posting to `form_action`
pub fn render(attrs: &ButtonAttributes, form_action: &str, nonce: &str) -> String {
    let hidden = |name: &str, value: &str| {
        format!(
            r#"<input type="hidden" name="{}" value="{}" />"#,
            name,
            escape(value)
        )
    };

    let amount = attrs.amount.to_string();
    let amount_field = if attrs.custom_amount {
        format!(
            r#"<input type="number" min="1" step="1" name="amount" value="{amount}" required />"#
        )
    } else {
        hidden("amount", &amount)
    };

    let mut html = format!(
        r#"<form method="POST" action="{}" class="kagg-stripe-form">"#,
        escape(form_action)
    );
    html.push_str(&hidden("action", CHECKOUT_ACTION));
    html.push_str(&hidden("_wpnonce", nonce));
    html.push_str(&hidden("mode", &attrs.mode));
    html.push_str(&hidden("price", &attrs.price));
    html.push_str(&hidden("currency", &attrs.currency));
    html.push_str(&hidden("description", &attrs.description));
    html.push_str(&amount_field);
    html.push_str(&format!(r#"<button type="submit">{}</button>"#, escape(&attrs.label)));
    html.push_str("</form>");
    html
}

impl Checkout {
    /// Button markup with a fresh nonce for `user`
    pub fn render_button(
        &self,
        attrs: &ButtonAttributes,
        form_action: &str,
        user: Option<&CurrentUser>,
    ) -> String {
        render(attrs, form_action, &self.nonce_for(user))
    }
}
