//! HTML drift report

use super::drift::ColumnDrift;
use super::ValidationStatus;
use std::collections::BTreeMap;
use std::fmt::Write;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn joined_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        escape(&items.join(", "))
    }
}

/// Render the validation outcome and the per-column KS table
pub fn render_drift_report(drift: &BTreeMap<String, ColumnDrift>, status: &ValidationStatus) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(
        "<html>\n<head>\n<title>Data Drift Report</title>\n<style>\n\
         body { font-family: Arial, sans-serif; margin: 20px; }\n\
         .header { background-color: #f8f9fa; padding: 20px; margin-bottom: 20px; }\n\
         .section { margin-bottom: 30px; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }\n\
         th { background-color: #f2f2f2; }\n\
         .drift-detected { color: red; }\n\
         .no-drift { color: green; }\n\
         </style>\n</head>\n<body>\n",
    );

    let _ = writeln!(
        html,
        "<div class='header'>\n<h1>Data Drift Analysis Report</h1>\n\
         <p>Validation Status: <strong>{}</strong></p>\n</div>",
        if status.validation_status { "Passed" } else { "Failed" }
    );

    let _ = writeln!(
        html,
        "<div class='section'>\n<h2>Validation Details</h2>\n\
         <h3>Training Data Validation</h3>\n\
         <p>Status: {}</p>\n<p>Missing Columns: {}</p>\n<p>Data Type Errors: {}</p>\n\
         <h3>Test Data Validation</h3>\n\
         <p>Status: {}</p>\n<p>Missing Columns: {}</p>\n<p>Data Type Errors: {}</p>\n</div>",
        status.train_validation.status,
        joined_or_none(&status.train_validation.missing_columns),
        joined_or_none(&status.train_validation.dtype_errors),
        status.test_validation.status,
        joined_or_none(&status.test_validation.missing_columns),
        joined_or_none(&status.test_validation.dtype_errors),
    );

    html.push_str(
        "<div class='section'>\n<h2>Data Drift Analysis</h2>\n<table>\n\
         <tr>\n<th>Feature</th>\n<th>KS Statistic</th>\n<th>P-Value</th>\n<th>Drift Status</th>\n</tr>\n",
    );
    for (feature, result) in drift {
        let (label, class) = if result.drift_detected {
            ("Drift Detected", "drift-detected")
        } else {
            ("No Drift", "no-drift")
        };
        let _ = writeln!(
            html,
            "<tr>\n<td>{}</td>\n<td>{:.4}</td>\n<td>{:.4}</td>\n<td class='{}'>{}</td>\n</tr>",
            escape(feature),
            result.ks_statistic,
            result.p_value,
            class,
            label
        );
    }
    html.push_str("</table>\n</div>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::SplitValidation;

    #[test]
    fn test_report_contents() {
        let status = ValidationStatus {
            validation_status: false,
            train_validation: SplitValidation {
                status: false,
                missing_columns: vec!["job".into()],
                dtype_errors: vec![],
            },
            test_validation: SplitValidation {
                status: true,
                missing_columns: vec![],
                dtype_errors: vec![],
            },
        };
        let mut drift = BTreeMap::new();
        drift.insert(
            "age".to_string(),
            ColumnDrift { ks_statistic: 0.12345, p_value: 0.01, drift_detected: true },
        );

        let html = render_drift_report(&drift, &status);
        assert!(html.contains("Validation Status: <strong>Failed</strong>"));
        assert!(html.contains("Missing Columns: job"));
        assert!(html.contains("<td>0.1235</td>"));
        assert!(html.contains("<td class='drift-detected'>Drift Detected</td>"));
    }
}
