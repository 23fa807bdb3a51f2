//! # Notification Rendering
//!
//! Renders the messages the kiosk sends to customers and admins. Each
//! message has a chat (markdown) body, an email (HTML) body and a chat
//! payload; kiosk-db queues them in the outbox and an external worker
//! delivers them.
//!
//! ```text
//! checkout ─────────► receipt()          ──┐
//! send_invoice ─────► invoice()          ──┤
//! settle_customer ──► payment_received() ──┼──► Notification ──► outbox
//! request_product ──► product_request()  ──┘
//! ```
//!
//! Amounts are shown in whole major units (see [`Money::format_whole`]).

use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CartLine, Customer, NotificationKind, Transaction};

/// Placeholder in the payment link template replaced by the amount due.
pub const AMOUNT_PLACEHOLDER: &str = "{AMOUNT}";

const QR_CODE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// A rendered message, ready to queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Option<String>,
    pub subject: String,
    /// Chat body (markdown).
    pub text: String,
    /// Email body.
    pub html: String,
    #[ts(type = "unknown")]
    pub chat_payload: serde_json::Value,
}

impl Notification {
    fn new(kind: NotificationKind, recipient: Option<&str>, subject: &str, text: String, html: String) -> Self {
        let chat_payload = json!({ "text": text });
        Notification {
            kind,
            recipient: recipient.map(str::to_string),
            subject: subject.to_string(),
            text,
            html,
            chat_payload,
        }
    }

    /// The same message addressed to someone else.
    pub fn addressed_to(&self, recipient: &str) -> Self {
        Notification {
            recipient: Some(recipient.to_string()),
            ..self.clone()
        }
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// Receipt sent after a checkout.
pub fn receipt(
    customer_name: &str,
    email: Option<&str>,
    lines: &[CartLine],
    total: Money,
    new_balance: Money,
    currency_symbol: &str,
) -> Notification {
    let items: Vec<String> = lines.iter().map(|l| format_line(l, currency_symbol)).collect();
    let total = total.format_whole(currency_symbol);
    let balance = new_balance.format_whole(currency_symbol);

    let text = format!(
        "*Receipt :wave:*\n\n{}\n\n*Total: {}*\n\n*New balance: {}*\n\nThank you for your purchase, {}!",
        items.join("\n"),
        total,
        balance,
        customer_name
    );
    let html = format!(
        "<strong>Receipt 👋</strong><br/><br/>{}<br/><br/>Total: {}<br/><br/>New balance: {}<br/><br/>Thank you for your purchase, {}!",
        html_lines(&items),
        total,
        balance,
        escape_html(customer_name)
    );

    Notification::new(NotificationKind::Receipt, email, "Receipt", text, html)
}

/// Invoice listing every unpaid line of the customer.
///
/// `amount` is the figure billed. When a payment link template is given,
/// `{AMOUNT}` in it is replaced by `amount` with two decimals, and the
/// message carries a QR code image encoding the link.
pub fn invoice(
    customer: &Customer,
    transactions: &[Transaction],
    amount: Money,
    payment_link_template: Option<&str>,
    currency_symbol: &str,
) -> Notification {
    let items: Vec<String> = transactions
        .iter()
        .filter(|t| t.belongs_to(&customer.id) && !t.paid)
        .flat_map(|t| t.items.iter())
        .map(|l| format!("• {}", format_line(l, currency_symbol)))
        .collect();
    let total_line = format!("Total: {}", amount.format_whole(currency_symbol));
    let link = payment_link_template.map(|template| payment_link(template, amount));

    let greeting = format!("*Hello {}!* :wave:\n\nHere is your invoice from the kiosk:", customer.name);
    let mut text = format!("{}\n\n{}\n\n*{}*", greeting, items.join("\n"), total_line);
    let mut html = format!(
        "<strong>Hello {}! 👋</strong><br/><br/>Here is your invoice from the kiosk:<br/><br/>{}<br/><br/>{}",
        escape_html(&customer.name),
        html_lines(&items),
        total_line
    );

    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": format!("{}\n\n{}\n\n*{}*", greeting, items.join("\n"), total_line) },
    })];

    match &link {
        Some(link) => {
            let qr = qr_code_url(link);
            text.push_str(&format!(
                "\n\nPay easily by scanning the QR code below. Thank you for your purchase 🙌\n\n{}",
                link
            ));
            html.push_str(&format!(
                "<br/><br/>Pay easily by scanning the QR code below. Thank you for your purchase 🙌<br/><img src=\"{}\" alt=\"Payment QR code\" /><br/>{}",
                escape_html(&qr),
                escape_html(link)
            ));
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": "Pay easily by scanning the QR code below. Thank you for your purchase 🙌" },
            }));
            blocks.push(json!({ "type": "image", "image_url": qr, "alt_text": "Payment QR code" }));
            blocks.push(json!({ "type": "section", "text": { "type": "mrkdwn", "text": link } }));
        }
        None => {
            text.push_str("\n\nThank you for your purchase 🙌");
            html.push_str("<br/><br/>Thank you for your purchase 🙌");
        }
    }

    Notification {
        kind: NotificationKind::Invoice,
        recipient: customer.email.clone(),
        subject: "Here is your invoice from the kiosk".to_string(),
        text,
        html,
        chat_payload: json!({ "blocks": blocks }),
    }
}

/// Confirmation sent when a customer's pending invoices are settled.
pub fn payment_received(customer: &Customer, amount: Money, currency_symbol: &str) -> Notification {
    let amount = amount.format_whole(currency_symbol);
    let text = format!(
        "*Hello {}!* :wave:\n\nThank you for your payment of {}",
        customer.name, amount
    );
    let html = format!(
        "<strong>Hello {}! 👋</strong><br/><br/>Thank you for your payment of {}",
        escape_html(&customer.name),
        amount
    );

    Notification::new(
        NotificationKind::PaymentReceived,
        customer.email.as_deref(),
        "Payment received",
        text,
        html,
    )
}

/// Admin alert for an out-of-stock request. Unaddressed; the caller fans
/// it out with [`Notification::addressed_to`].
pub fn product_request(product_name: &str, variant_name: Option<&str>) -> Notification {
    let item = match variant_name {
        Some(variant) if !variant.is_empty() => format!("{} ({})", product_name, variant),
        _ => product_name.to_string(),
    };
    let text = format!("*New product request :wave:*\n\n{}", item);
    let html = format!("<strong>New product request 👋</strong><br/><br/>{}", escape_html(&item));

    Notification::new(NotificationKind::ProductRequest, None, "New product request", text, html)
}

// =============================================================================
// Helpers
// =============================================================================

/// Fills `{AMOUNT}` in a payment link template, e.g. a mobile-payment URL.
///
/// ## Example
/// ```rust
/// use kiosk_core::money::Money;
/// use kiosk_core::notification::payment_link;
///
/// let link = payment_link("https://pay.example/?amount={AMOUNT}", Money::from_major(42));
/// assert_eq!(link, "https://pay.example/?amount=42.00");
/// ```
pub fn payment_link(template: &str, amount: Money) -> String {
    template.replace(AMOUNT_PLACEHOLDER, &amount.to_string())
}

/// URL of a 150×150 QR code image encoding `data`.
pub fn qr_code_url(data: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(data.as_bytes()).collect();
    format!("{}?data={}&size=150x150", QR_CODE_ENDPOINT, encoded)
}

fn format_line(line: &CartLine, currency_symbol: &str) -> String {
    format!(
        "{} pc {} - {}",
        line.quantity,
        line.display_name(),
        line.line_total().format_whole(currency_symbol)
    )
}

fn html_lines(items: &[String]) -> String {
    items.iter().map(|i| escape_html(i)).collect::<Vec<_>>().join("<br/>")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
