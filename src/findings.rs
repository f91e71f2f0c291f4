//! The narrative findings page.

use crate::{
    config::Config,
    money::{group_thousands, Money},
    report::Report,
};

/// Label for the total-sales figure, naming the span of years when known,
/// e.g. `Total Sales (2011-2014)`.
#[must_use]
pub fn total_sales_label(report: &Report) -> String {
    match report.year_span() {
        Some((first, last)) if first == last => format!("Total Sales ({first})"),
        Some((first, last)) => format!("Total Sales ({first}-{last})"),
        None => "Total Sales".to_string(),
    }
}

/// Composes the findings text, one line per worksheet row.
#[must_use]
pub fn findings(report: &Report, config: &Config) -> Vec<String> {
    let cur = config.currency.as_str();
    let mut lines = vec![
        "Executive Summary:".to_string(),
        format!(
            "- {}: {}",
            total_sales_label(report),
            report.total_sales.display_with(cur)
        ),
        format!(
            "- Total Orders: {}",
            group_thousands(report.total_orders as u64)
        ),
        format!("- Distinct Managers: {}", report.distinct_managers),
        format!(
            "- Average Order Value: {}",
            report.average_order_value.display_with(cur)
        ),
        String::new(),
    ];

    if let Some(top) = report.top_manager() {
        let above = top.sales.cents() - report.manager_mean().cents();
        let pct = Money::from_cents(above).ratio(report.manager_mean()) * 100.0;
        lines.push("Manager Performance:".to_string());
        lines.push(format!(
            "- Top Manager: {} with {} ({pct:.1}% above manager average). \
             Consider incentives and capturing their playbook.",
            top.name,
            top.sales.display_with(cur)
        ));
        lines.push(String::new());
    }

    if let Some(category) = report.top_category() {
        lines.push("Category Trends:".to_string());
        lines.push(format!(
            "- Top Category by cumulative sales: {} \
             (consider re-allocating marketing spend toward this category).",
            category.name
        ));
        if let (Some((first_year, last_year)), Some((first, last, pct))) =
            (report.year_span(), category.change())
        {
            lines.push(format!(
                "- {} sales in {first_year}: {}; in {last_year}: {} (change: {pct:.1}% \
                 between {first_year} and {last_year}).",
                category.name,
                first.display_with(cur),
                last.display_with(cur)
            ));
        }
        lines.push(String::new());
    }

    if let Some((product, share)) = report.top_product() {
        lines.push("Top Product:".to_string());
        lines.push(format!(
            "- Top Product: {} contributes {:.1}% of total sales. \
             Recommend bundling and heavier advertising.",
            product.name,
            share * 100.0
        ));
        lines.push(String::new());
    }

    lines.extend(
        [
            "Recommendations Framework:",
            "- Managerial Performance: implement tiered incentives, targeted training for \
             bottom performers, and consider reassigning managers with consistent \
             underperformance.",
            "- Category Trends: increase inventory and promotions for high-growth categories; \
             reduce stock for persistently declining categories.",
            "- Top Product: raise advertising spend, create bundle offers, and monitor stock \
             to avoid stockouts.",
            "",
            "Notes:",
            "- All numeric KPIs in this workbook are live formulas referencing the 'Data' \
             sheet. Editing data in 'Data' will recalculate all results and charts.",
        ]
        .map(str::to_string),
    );
    lines.push(format!("- Amounts are shown in {cur}."));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn lines_for(path: &str, config: &Config) -> Vec<String> {
        let mut data = Dataset::from_path(path, None).unwrap();
        data.prepare(&config.product_groups()).unwrap();
        findings(&Report::new(&data, config).unwrap(), config)
    }

    #[test]
    fn findings_fn_summarises_toy_data() {
        let lines = lines_for("testdata/toy.csv", &Config::default());
        assert_eq!(lines[0], "Executive Summary:");
        assert_eq!(lines[1], "- Total Sales (2014): ₦300.00");
        assert_eq!(lines[2], "- Total Orders: 2");
        assert_eq!(lines[3], "- Distinct Managers: 2");
        assert_eq!(lines[4], "- Average Order Value: ₦150.00");
        assert!(lines
            .iter()
            .any(|l| l.starts_with("- Top Manager: B with ₦200.00 (33.3% above")));
    }

    #[test]
    fn findings_fn_reports_category_change_and_top_product() {
        let config = Config {
            currency: "$".into(),
            ..Config::default()
        };
        let lines = lines_for("testdata/orders.csv", &config);
        assert!(lines.contains(&"- Total Sales (2011-2014): $3,486.59".to_string()));
        assert!(lines.iter().any(|l| l.contains(
            "- Furniture sales in 2011: $502.49; in 2014: $0.00 (change: -100.0%"
        )));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("- Top Product: Hon Stacking Chairs contributes 34.8%")));
        assert_eq!(lines.last().unwrap(), "- Amounts are shown in $.");
    }

    #[test]
    fn findings_fn_skips_sections_without_data() {
        let lines = findings(&Report::default(), &Config::default());
        assert_eq!(lines[1], "- Total Sales: ₦0.00");
        assert!(!lines.iter().any(|l| l.starts_with("Manager Performance")));
        assert!(!lines.iter().any(|l| l.starts_with("Top Product:")));
    }
}
