use anyhow::Result;

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt::Display,
};

use crate::{
    config::Config,
    dataset::{Dataset, Transaction, PRODUCT_GROUP, PRODUCT_NAME},
    money::Money,
};

/// Label shown for sales with no manager.
pub const UNASSIGNED: &str = "(Unassigned)";

/// Holds the aggregated sales figures that the workbook and findings are
/// built from.
///
/// To compute a `Report`, use [`Report::new`] on a prepared [`Dataset`], or
/// [`Report::from_transactions`].
///
/// To get a printable summary, use its [`Display`] implementation.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub total_sales: Money,
    /// Distinct non-blank order IDs.
    pub total_orders: usize,
    /// Distinct non-blank managers.
    pub distinct_managers: usize,
    pub average_order_value: Money,
    /// Every year with at least one dated order, ascending.
    pub years: Vec<i32>,
    pub sales_by_year: Vec<Money>,
    /// Managers in name order, with unassigned sales last.
    pub managers: Vec<ManagerSales>,
    /// Categories in name order, each with sales per year of [`Self::years`].
    pub categories: Vec<CategorySales>,
    /// Indices into [`Self::categories`] of the best-selling categories.
    pub top_categories: Vec<usize>,
    /// Best-selling products, descending.
    pub top_products: Vec<ProductSales>,
    /// Column the products are keyed on: product name or product group.
    pub product_column: &'static str,
}

/// Sales for one manager.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerSales {
    /// Empty for sales with no manager.
    pub name: String,
    pub sales: Money,
    /// 1 for the highest sales; equal sales share a rank.
    pub rank: usize,
}

impl ManagerSales {
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            UNASSIGNED
        } else {
            &self.name
        }
    }
}

/// Sales for one category, broken down by year.
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySales {
    pub name: String,
    pub by_year: Vec<Money>,
    /// Includes undated sales, so may exceed the sum of `by_year`.
    pub total: Money,
}

/// Sales for one product (or product group).
#[derive(Clone, Debug, PartialEq)]
pub struct ProductSales {
    pub name: String,
    pub sales: Money,
    /// Fraction of the top-products subtotal.
    pub share: f64,
}

/// Sums keyed without regard to letter case, the way `SUMIF` criteria match.
/// Each group is labelled with the first spelling seen.
#[derive(Default)]
struct Caseless<'a, V>(BTreeMap<String, (&'a str, V)>);

impl<'a, V: Default> Caseless<'a, V> {
    fn entry(&mut self, name: &'a str) -> &mut V {
        &mut self
            .0
            .entry(name.to_lowercase())
            .or_insert_with(|| (name, V::default()))
            .1
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn into_groups(self) -> impl Iterator<Item = (&'a str, V)> {
        self.0.into_values()
    }
}

impl Report {
    /// Computes the report for a prepared dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset lacks a required column.
    pub fn new(dataset: &Dataset, config: &Config) -> Result<Self> {
        let transactions = dataset.transactions()?;
        Ok(Self::from_transactions(&transactions, config))
    }

    /// Computes the report from typed rows.
    #[must_use]
    pub fn from_transactions(transactions: &[Transaction], config: &Config) -> Self {
        let grouped = !config.product_groups().is_empty();
        let mut report = Self {
            product_column: if grouped { PRODUCT_GROUP } else { PRODUCT_NAME },
            ..Self::default()
        };

        let mut orders = HashSet::new();
        let mut named_managers: Caseless<Money> = Caseless::default();
        let mut unassigned: Option<Money> = None;
        let mut years = BTreeSet::new();
        let mut category_years: Caseless<(Money, BTreeMap<i32, Money>)> = Caseless::default();
        let mut products: Caseless<Money> = Caseless::default();

        for t in transactions {
            report.total_sales += t.sales;
            if let Some(id) = &t.order_id {
                orders.insert(id.to_lowercase());
            }
            if t.manager.is_empty() {
                *unassigned.get_or_insert_with(Money::default) += t.sales;
            } else {
                *named_managers.entry(&t.manager) += t.sales;
            }
            if let Some(year) = t.year {
                years.insert(year);
            }
            if let Some(category) = &t.category {
                let (total, by_year) = category_years.entry(category);
                *total += t.sales;
                if let Some(year) = t.year {
                    *by_year.entry(year).or_default() += t.sales;
                }
            }
            let product = if grouped {
                t.product_group.as_ref().or(t.product.as_ref())
            } else {
                t.product.as_ref()
            };
            if let Some(product) = product {
                *products.entry(product) += t.sales;
            }
        }

        report.total_orders = orders.len();
        report.distinct_managers = named_managers.len();
        report.average_order_value = report.total_sales.per(report.total_orders);
        report.years = years.into_iter().collect();

        report.managers = named_managers
            .into_groups()
            .map(|(name, sales)| ManagerSales {
                name: name.to_string(),
                sales,
                rank: 0,
            })
            .chain(unassigned.map(|sales| ManagerSales {
                name: String::new(),
                sales,
                rank: 0,
            }))
            .collect();
        let all_sales: Vec<Money> = report.managers.iter().map(|m| m.sales).collect();
        for manager in &mut report.managers {
            manager.rank = 1 + all_sales.iter().filter(|s| **s > manager.sales).count();
        }

        report.categories = category_years
            .into_groups()
            .map(|(name, (total, by_year))| CategorySales {
                name: name.to_string(),
                by_year: report
                    .years
                    .iter()
                    .map(|y| by_year.get(y).copied().unwrap_or_default())
                    .collect(),
                total,
            })
            .collect();
        let mut ranked: Vec<usize> = (0..report.categories.len()).collect();
        ranked.sort_by_key(|&i| Reverse(report.categories[i].total));
        ranked.truncate(config.top_categories);
        report.top_categories = ranked;

        report.sales_by_year = report
            .years
            .iter()
            .map(|year| {
                transactions
                    .iter()
                    .filter(|t| t.year == Some(*year))
                    .map(|t| t.sales)
                    .sum()
            })
            .collect();

        let mut products: Vec<(&str, Money)> = products.into_groups().collect();
        products.sort_by_key(|(_, sales)| Reverse(*sales));
        products.truncate(config.top_products);
        let subtotal: Money = products.iter().map(|(_, sales)| *sales).sum();
        report.top_products = products
            .into_iter()
            .map(|(name, sales)| ProductSales {
                name: name.to_string(),
                sales,
                share: sales.ratio(subtotal),
            })
            .collect();

        report
    }

    /// The first and last years of the data, if any order is dated.
    #[must_use]
    pub fn year_span(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    /// The named manager with the highest sales (first by name on ties).
    #[must_use]
    pub fn top_manager(&self) -> Option<&ManagerSales> {
        self.named_managers().min_by_key(|m| (m.rank, m.name.as_str()))
    }

    /// Mean sales per named manager.
    #[must_use]
    pub fn manager_mean(&self) -> Money {
        let total: Money = self.named_managers().map(|m| m.sales).sum();
        total.per(self.distinct_managers)
    }

    fn named_managers(&self) -> impl Iterator<Item = &ManagerSales> {
        self.managers.iter().filter(|m| !m.name.is_empty())
    }

    /// The category with the highest total sales.
    #[must_use]
    pub fn top_category(&self) -> Option<&CategorySales> {
        self.top_categories.first().map(|&i| &self.categories[i])
    }

    /// The best-selling product and its share of total sales (not just of
    /// the top products).
    #[must_use]
    pub fn top_product(&self) -> Option<(&ProductSales, f64)> {
        self.top_products
            .first()
            .map(|p| (p, p.sales.ratio(self.total_sales)))
    }
}

impl CategorySales {
    /// Sales in the first and last year, and the percentage change between
    /// them (0 when the first year had no sales).
    #[must_use]
    pub fn change(&self) -> Option<(Money, Money, f64)> {
        let first = *self.by_year.first()?;
        let last = *self.by_year.last()?;
        let pct = if first.cents() == 0 {
            0.0
        } else {
            Money::from_cents(last.cents() - first.cents()).ratio(first) * 100.0
        };
        Some((first, last, pct))
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .managers
            .iter()
            .map(|m| m.label().len())
            .chain(self.top_products.iter().map(|p| p.name.len()))
            .chain(std::iter::once("Average order value".len()))
            .max()
            .unwrap_or_default();
        let length = width + 20;

        writeln!(f, "{:width$} {:>6} {:>12}", "Manager", "Rank", "Sales")?;
        writeln!(f, "{:-<length$}", "")?;
        for m in &self.managers {
            writeln!(f, "{:width$} {:>6} {:>12}", m.label(), m.rank, m.sales)?;
        }
        writeln!(f)?;

        writeln!(f, "{:width$} {:>6} {:>12}", "Product", "Share", "Sales")?;
        writeln!(f, "{:-<length$}", "")?;
        for p in &self.top_products {
            let share = format!("{:.1}%", p.share * 100.0);
            writeln!(f, "{:width$} {share:>6} {:>12}", p.name, p.sales)?;
        }
        writeln!(f, "{:-<length$}", "")?;

        writeln!(f, "{:width$} {:>19}", "Total sales", self.total_sales)?;
        writeln!(f, "{:width$} {:>19}", "Total orders", self.total_orders)?;
        writeln!(f, "{:width$} {:>19}", "Managers", self.distinct_managers)?;
        writeln!(
            f,
            "{:width$} {:>19}",
            "Average order value", self.average_order_value
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::Groups;

    fn report_for(path: &str, config: &Config) -> Report {
        let mut data = Dataset::from_path(path, None).unwrap();
        data.prepare(&config.product_groups()).unwrap();
        Report::new(&data, config).unwrap()
    }

    fn orders() -> Report {
        report_for("testdata/orders.csv", &Config::default())
    }

    #[test]
    fn new_fn_ranks_toy_managers_and_totals_sales() {
        let report = report_for("testdata/toy.csv", &Config::default());
        assert_eq!(report.total_sales, Money::from_cents(30_000));
        let ranks: Vec<(&str, usize)> = report
            .managers
            .iter()
            .map(|m| (m.name.as_str(), m.rank))
            .collect();
        assert_eq!(ranks, vec![("A", 2), ("B", 1)]);
        assert_eq!(report.years, vec![2014]);
        assert_eq!(report.top_manager().unwrap().name, "B");
    }

    #[test]
    fn manager_sales_sum_to_total_sales() {
        let report = orders();
        let sum: Money = report.managers.iter().map(|m| m.sales).sum();
        assert_eq!(sum, report.total_sales);
        assert_eq!(report.total_sales, Money::from_cents(348_659));
        assert_eq!(report.managers.last().unwrap().label(), UNASSIGNED);
        assert_eq!(report.distinct_managers, 4);
    }

    #[test]
    fn top_product_shares_sum_to_one() {
        let config = Config {
            top_products: 3,
            ..Config::default()
        };
        let report = report_for("testdata/orders.csv", &config);
        assert_eq!(report.top_products.len(), 3);
        let total: f64 = report.top_products.iter().map(|p| p.share).sum();
        assert!((total - 1.0).abs() < 1e-9, "shares sum to {total}");
        let names: Vec<&str> = report.top_products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Hon Stacking Chairs",
                "Samsung Galaxy Mega 6.3",
                "Bevis Round Table, Adjustable Height"
            ]
        );
    }

    #[test]
    fn top_products_fn_keys_on_product_groups_when_configured() {
        let mut config = Config::default();
        config.read_groups("testdata/groups").unwrap();
        let report = report_for("testdata/orders.csv", &config);
        assert_eq!(report.product_column, PRODUCT_GROUP);
        assert_eq!(report.top_products[0].name, "Phones");
        assert_eq!(report.top_products[0].sales, Money::from_cents(141_597));
    }

    #[test]
    fn average_order_value_is_sales_over_distinct_orders() {
        let report = orders();
        assert_eq!(report.total_orders, 9);
        assert_eq!(report.average_order_value, report.total_sales.per(9));
    }

    #[test]
    fn average_order_value_is_zero_without_orders() {
        let report = Report::from_transactions(&[], &Config::default());
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.average_order_value, Money::default());
        assert!(report.year_span().is_none());
        assert!(report.top_manager().is_none());
        assert!(report.top_category().is_none());
        assert!(report.top_product().is_none());
    }

    #[test]
    fn categories_fn_pivot_sales_by_year() {
        let report = orders();
        assert_eq!(report.years, vec![2011, 2012, 2013, 2014]);
        let names: Vec<&str> = report.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Furniture", "Office Supplies", "Technology"]);
        let furniture = &report.categories[0];
        // The undated chair sale is in no year.
        assert_eq!(
            furniture.by_year,
            vec![
                Money::from_cents(50_249),
                Money::default(),
                Money::default(),
                Money::default()
            ]
        );
        assert_eq!(furniture.total, Money::from_cents(171_595));
        assert_eq!(report.top_category().unwrap().name, "Furniture");
        let (first, last, pct) = furniture.change().unwrap();
        assert_eq!(first, Money::from_cents(50_249));
        assert_eq!(last, Money::default());
        assert!((pct + 100.0).abs() < 1e-9, "{pct}");

        let technology = &report.categories[2];
        let (first, last, pct) = technology.change().unwrap();
        assert_eq!(first, Money::from_cents(37_797));
        assert_eq!(last, Money::from_cents(108_399));
        assert!((pct - 186.79).abs() < 0.01, "{pct}");
    }

    #[test]
    fn sales_by_year_fn_excludes_undated_rows() {
        let report = orders();
        let dated: Money = report.sales_by_year.iter().copied().sum();
        assert_eq!(dated, Money::from_cents(348_659 - 121_346));
    }

    #[test]
    fn new_fn_is_deterministic() {
        assert_eq!(orders(), orders());
    }

    #[test]
    fn new_fn_groups_names_differing_only_in_case() {
        let config = Config::default();
        let mut data = Dataset::from_path("testdata/toy.csv", None).unwrap();
        data.prepare(&Groups::default()).unwrap();
        let mut txns = data.transactions().unwrap();
        txns[0].manager = "chris".to_string();
        txns[1].manager = "Chris".to_string();
        txns[1].category = Some("technology".to_string());
        txns[1].order_id = Some("o-1".to_string());
        let report = Report::from_transactions(&txns, &config);

        assert_eq!(report.managers.len(), 1);
        assert_eq!(report.managers[0].name, "chris");
        assert_eq!(report.managers[0].sales, report.total_sales);
        let sum: Money = report.managers.iter().map(|m| m.sales).sum();
        assert_eq!(sum, report.total_sales);
        assert_eq!(report.distinct_managers, 1);
        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].name, "Technology");
        assert_eq!(report.total_orders, 1);
    }

    #[test]
    fn ties_share_a_rank() {
        let config = Config::default();
        let mut data = Dataset::from_path("testdata/toy.csv", None).unwrap();
        data.prepare(&Groups::default()).unwrap();
        let mut txns = data.transactions().unwrap();
        txns[0].sales = Money::from_cents(20_000);
        let report = Report::from_transactions(&txns, &config);
        assert!(report.managers.iter().all(|m| m.rank == 1));
        assert_eq!(report.top_manager().unwrap().name, "A");
    }

    #[test]
    fn display_fn_prints_totals() {
        let text = report_for("testdata/toy.csv", &Config::default()).to_string();
        assert!(text.contains("Total sales"), "{text}");
        assert!(text.contains("300.00"), "{text}");
    }
}
