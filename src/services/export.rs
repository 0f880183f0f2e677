//! CSV rendering of donation listings.

use crate::domain::DonationDetail;

pub const CSV_HEADER: [&str; 11] = [
    "ID",
    "Date",
    "Donor Name",
    "Donor Email",
    "Amount",
    "Type",
    "Method",
    "Status",
    "Transaction ID",
    "Reference ID",
    "Note",
];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders one row per donation. The date column shows when the donation
/// completed, falling back to when it was ordered.
pub fn render_csv(rows: &[DonationDetail]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in rows {
        let d = &row.donation;
        let date = d.donated_at.unwrap_or(d.created_at);
        writer.write_record([
            d.id.to_string(),
            date.format(DATE_FORMAT).to_string(),
            row.donor_name.clone().unwrap_or_default(),
            row.donor_email.clone().unwrap_or_default(),
            d.amount.with_scale(2).to_string(),
            d.donation_type.to_string(),
            d.method.clone(),
            d.status.to_string(),
            d.payment_id.clone().unwrap_or_default(),
            d.reference_id.map(|r| r.to_string()).unwrap_or_default(),
            d.note.clone().unwrap_or_default(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Donation, DonationStatus, DonationType};
    use bigdecimal::BigDecimal;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;
    use uuid::Uuid;

    fn detail(amount: &str, note: Option<&str>) -> DonationDetail {
        let mut donation = Donation::new_pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            BigDecimal::from_str(amount).unwrap(),
            DonationType::Annadanam,
            "order_1".to_string(),
            None,
            note.map(str::to_string),
        );
        donation.created_at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        DonationDetail {
            donation,
            donor_name: Some("Ravi Kumar".to_string()),
            donor_email: Some("ravi@example.com".to_string()),
            entity_name: Some("Sri Temple".to_string()),
        }
    }

    #[test]
    fn test_header_row() {
        let output = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            output.trim_end(),
            "ID,Date,Donor Name,Donor Email,Amount,Type,Method,Status,Transaction ID,Reference ID,Note"
        );
    }

    #[test]
    fn test_pending_row_formatting() {
        let row = detail("500", None);
        let id = row.donation.id;
        let output = String::from_utf8(render_csv(&[row]).unwrap()).unwrap();
        let line = output.lines().nth(1).unwrap();
        assert_eq!(
            line,
            format!(
                "{},2026-03-04 05:06:07,Ravi Kumar,ravi@example.com,500.00,annadanam,PENDING,PENDING,,,",
                id
            )
        );
    }

    #[test]
    fn test_completed_row_uses_donation_date() {
        let mut row = detail("1234.5", Some("in memory of, grandfather"));
        row.donation.status = DonationStatus::Success;
        row.donation.method = "upi".to_string();
        row.donation.payment_id = Some("pay_9".to_string());
        row.donation.donated_at = Some(Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap());

        let output = String::from_utf8(render_csv(&[row]).unwrap()).unwrap();
        let line = output.lines().nth(1).unwrap();
        assert!(line.contains(",2026-03-05 10:00:00,"));
        assert!(line.contains(",1234.50,annadanam,upi,SUCCESS,pay_9,,"));
        assert!(line.ends_with("\"in memory of, grandfather\""));
    }
}
