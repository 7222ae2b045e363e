use crate::supabase::OrderRecord;

/// Self-contained HTML invoice: inline CSS, print button, no external
/// assets. The storefront serves it directly to the browser.
pub fn render_invoice_html(order: &OrderRecord) -> String {
    let number = order
        .order_number
        .clone()
        .unwrap_or_else(|| format!("INV-{}", &order.id.chars().take(8).collect::<String>()));
    let date = order
        .created_at
        .map(|at| at.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "—".to_string());
    let status = order.status.as_deref().unwrap_or("en cours");
    let customer = order.customer_name.as_deref().unwrap_or("Client");
    let email = order.customer_email.as_deref().unwrap_or("");
    let phone = order.customer_phone.as_deref().unwrap_or("");
    let address = [order.shipping_address.as_deref(), order.city.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

    let mut rows = String::new();
    for item in &order.order_items {
        let line_total = item
            .total_price
            .unwrap_or(item.unit_price * item.quantity as f64);
        rows.push_str(&format!(
            "<tr><td>{name}</td><td class=\"num\">{qty}</td><td class=\"num\">{unit}</td><td class=\"num\">{total}</td></tr>\n",
            name = escape_html(&item.product_name),
            qty = item.quantity,
            unit = format_fcfa(item.unit_price),
            total = format_fcfa(line_total),
        ));
    }

    let computed_subtotal: f64 = order
        .order_items
        .iter()
        .map(|item| item.total_price.unwrap_or(item.unit_price * item.quantity as f64))
        .sum();
    let subtotal = order.subtotal.unwrap_or(computed_subtotal);
    let shipping = order.shipping_fee.unwrap_or(0.0);
    let total = order.total.unwrap_or(subtotal + shipping);

    format!(
        r#"<!doctype html>
<html lang="fr">
<head>
<meta charset="utf-8"/>
<title>Facture {number}</title>
<style>
  body {{ font-family: Arial, Helvetica, sans-serif; color: #1f2430; margin: 2rem auto; max-width: 720px; }}
  header {{ display: flex; justify-content: space-between; align-items: baseline; border-bottom: 3px solid #0f4c81; padding-bottom: 1rem; }}
  h1 {{ color: #0f4c81; margin: 0; }}
  .meta {{ text-align: right; font-size: 0.9rem; }}
  .parties {{ margin: 1.5rem 0; font-size: 0.95rem; }}
  table {{ width: 100%; border-collapse: collapse; margin-top: 1rem; }}
  th {{ background: #0f4c81; color: #fff; text-align: left; padding: 0.5rem; }}
  td {{ padding: 0.5rem; border-bottom: 1px solid #e2e6ee; }}
  td.num, th.num {{ text-align: right; }}
  tfoot td {{ font-weight: bold; border-top: 2px solid #0f4c81; }}
  .print-bar {{ margin-top: 2rem; }}
  .print-bar button {{ background: #0f4c81; color: #fff; border: 0; padding: 0.6rem 1.4rem; border-radius: 4px; cursor: pointer; }}
  @media print {{ .print-bar {{ display: none; }} body {{ margin: 0; }} }}
</style>
</head>
<body>
<header>
  <h1>JomionStore</h1>
  <div class="meta">
    <div>Facture <strong>{number}</strong></div>
    <div>Date : {date}</div>
    <div>Statut : {status}</div>
  </div>
</header>
<section class="parties">
  <strong>Facturé à</strong><br/>
  {customer}<br/>
  {address}<br/>
  {email} {phone}
</section>
<table>
  <thead>
    <tr><th>Article</th><th class="num">Qté</th><th class="num">Prix unitaire</th><th class="num">Total</th></tr>
  </thead>
  <tbody>
{rows}  </tbody>
  <tfoot>
    <tr><td colspan="3">Sous-total</td><td class="num">{subtotal}</td></tr>
    <tr><td colspan="3">Livraison</td><td class="num">{shipping}</td></tr>
    <tr><td colspan="3">Total</td><td class="num">{total}</td></tr>
  </tfoot>
</table>
<div class="print-bar">
  <button onclick="window.print()">Imprimer la facture</button>
</div>
</body>
</html>"#,
        number = escape_html(&number),
        date = date,
        status = escape_html(status),
        customer = escape_html(customer),
        address = escape_html(&address),
        email = escape_html(email),
        phone = escape_html(phone),
        rows = rows,
        subtotal = format_fcfa(subtotal),
        shipping = format_fcfa(shipping),
        total = format_fcfa(total),
    )
}

/// XOF carries no minor unit; amounts round to whole francs with spaced
/// thousands.
pub fn format_fcfa(amount: f64) -> String {
    let rounded = amount.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut grouped = String::new();
    for (index, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - index;
        if index > 0 && remaining % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{grouped} FCFA")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::OrderItemRecord;

    fn order() -> OrderRecord {
        OrderRecord {
            id: "a1b2c3d4-0000-0000-0000-000000000000".into(),
            order_number: Some("JOM-2024-0042".into()),
            created_at: None,
            status: Some("payée".into()),
            customer_name: Some("Awa Sossou".into()),
            customer_email: Some("awa@example.com".into()),
            customer_phone: Some("+229 97 00 00 00".into()),
            shipping_address: Some("Rue 12.043".into()),
            city: Some("Cotonou".into()),
            subtotal: Some(12500.0),
            shipping_fee: Some(1500.0),
            total: Some(14000.0),
            order_items: vec![OrderItemRecord {
                product_name: "Montre connectée <Pro>".into(),
                quantity: 2,
                unit_price: 6250.0,
                total_price: Some(12500.0),
            }],
        }
    }

    #[test]
    fn fcfa_formatting_groups_thousands() {
        assert_eq!(format_fcfa(14000.0), "14 000 FCFA");
        assert_eq!(format_fcfa(999.4), "999 FCFA");
        assert_eq!(format_fcfa(1234567.0), "1 234 567 FCFA");
        assert_eq!(format_fcfa(0.0), "0 FCFA");
    }

    #[test]
    fn invoice_contains_order_and_totals() {
        let html = render_invoice_html(&order());
        assert!(html.contains("JOM-2024-0042"));
        assert!(html.contains("14 000 FCFA"));
        assert!(html.contains("window.print()"));
        assert!(html.contains("Awa Sossou"));
    }

    #[test]
    fn item_names_are_escaped() {
        let html = render_invoice_html(&order());
        assert!(html.contains("Montre connectée &lt;Pro&gt;"));
        assert!(!html.contains("<Pro>"));
    }

    #[test]
    fn line_total_computed_when_absent() {
        let mut record = order();
        record.order_items[0].total_price = None;
        record.subtotal = None;
        record.total = None;
        let html = render_invoice_html(&record);
        assert!(html.contains("12 500 FCFA"));
    }

    #[test]
    fn missing_order_number_falls_back_to_id_prefix() {
        let mut record = order();
        record.order_number = None;
        let html = render_invoice_html(&record);
        assert!(html.contains("INV-a1b2c3d4"));
    }
}
