//! Redistribution list I/O
//!
//! The list is free text with a delimited data section:
//!
//! ```text
//! Redistribution for epoch 42           <- ignored
//! Address,Amount                        <- opens the data section
//! kaspa:qq...,12.5
//! qq...,3                               <- active prefix prepended
//! End of redistribution report          <- closes it
//! ```
//!
//! Recovery files are written in the same format, so they can be fed back in.

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::core_types::{Amount, Transfer};
use crate::network::NetworkProfile;

pub const HEADER: &str = "Address,Amount";
pub const TRAILER: &str = "End of redistribution report";

/// Transfers read from a list, with line accounting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub transfers: Vec<Transfer>,
    pub valid_lines: usize,
    pub invalid_lines: usize,
    pub has_trailer: bool,
}

/// Read and validate a list file for the network whose addresses carry
/// `address_prefix`
pub fn load_redistribution(path: &Path, address_prefix: &str) -> Result<ParsedList> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let parsed = parse_redistribution(&content, address_prefix)
        .with_context(|| format!("Invalid redistribution file {}", path.display()))?;
    info!(
        file = %path.display(),
        "Redistribution file: {} valid lines, {} invalid lines",
        parsed.valid_lines, parsed.invalid_lines
    );
    Ok(parsed)
}

/// Parse list text. Only a missing header is an error; bad data lines are
/// counted and skipped.
pub fn parse_redistribution(content: &str, address_prefix: &str) -> Result<ParsedList> {
    if !content.contains(HEADER) {
        bail!("'{}' header missing", HEADER);
    }

    let mut parsed = ParsedList {
        has_trailer: content.contains(TRAILER),
        ..Default::default()
    };
    if !parsed.has_trailer {
        warn!("Suspicious file format: '{}' missing", TRAILER);
    }

    let mut in_data = false;
    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(HEADER) {
            in_data = true;
            continue;
        }
        if line.contains(TRAILER) {
            break;
        }
        if !in_data || !line.contains(',') {
            continue;
        }

        match parse_line(line, line_num, address_prefix) {
            Some(transfer) => {
                parsed.transfers.push(transfer);
                parsed.valid_lines += 1;
            }
            None => parsed.invalid_lines += 1,
        }
    }

    Ok(parsed)
}

fn parse_line(line: &str, line_num: usize, address_prefix: &str) -> Option<Transfer> {
    let mut parts = line.split(',');
    let (Some(address), Some(raw_amount)) = (parts.next(), parts.next()) else {
        warn!(line = line_num, "Incorrect format (should be 'address,amount'): {}", line);
        return None;
    };
    let raw_amount = raw_amount.trim();

    let amount: Decimal = match raw_amount.parse() {
        Ok(amount) => amount,
        Err(_) => {
            warn!(line = line_num, "Non-numeric amount: {}", raw_amount);
            return None;
        }
    };
    if amount <= Decimal::ZERO {
        warn!(line = line_num, "Invalid amount (must be positive): {}", raw_amount);
        return None;
    }

    let address = normalize_address(address.trim(), address_prefix, line_num)?;
    Some(Transfer::new(address, amount, raw_amount))
}

/// Keep addresses of the active network, prefix bare ones, reject the rest
fn normalize_address(address: &str, address_prefix: &str, line_num: usize) -> Option<String> {
    if address.starts_with(address_prefix) {
        return Some(address.to_string());
    }
    if !NetworkProfile::KNOWN_PREFIXES
        .iter()
        .any(|p| address.starts_with(p))
    {
        let prefixed = format!("{}{}", address_prefix, address);
        info!(line = line_num, "Prefix added to address: {}", prefixed);
        return Some(prefixed);
    }
    warn!(
        line = line_num,
        "Address ignored as incompatible with the network: {}", address
    );
    None
}

/// Render transfers as a list file, header and trailer included
pub fn format_list(transfers: &[Transfer]) -> String {
    let mut out = String::with_capacity(64 * (transfers.len() + 2));
    out.push_str(HEADER);
    out.push('\n');
    for t in transfers {
        out.push_str(&t.address);
        out.push(',');
        out.push_str(&t.raw_amount);
        out.push('\n');
    }
    out.push_str(TRAILER);
    out.push('\n');
    out
}

pub fn total_amount(transfers: &[Transfer]) -> Amount {
    transfers.iter().map(|t| t.amount).sum()
}

/// Total plus one estimated network fee per transfer
pub fn total_with_fees(transfers: &[Transfer], fee_per_transfer: Amount) -> Amount {
    total_amount(transfers) + fee_per_transfer * Decimal::from(transfers.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MAINNET: &str = "kaspa:";
    const TESTNET: &str = "kaspatest:";

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_with_preamble_and_trailer() {
        let content = "\
Redistribution for epoch 42
total: 3 recipients

Address,Amount
kaspa:qqa,12.5
kaspa:qqb, 3
End of redistribution report
kaspa:qqafter,1
";
        let parsed = parse_redistribution(content, MAINNET).unwrap();

        assert_eq!(parsed.valid_lines, 2);
        assert_eq!(parsed.invalid_lines, 0);
        assert!(parsed.has_trailer);
        assert_eq!(parsed.transfers[0], Transfer::new("kaspa:qqa", dec("12.5"), "12.5"));
        assert_eq!(parsed.transfers[1].raw_amount, "3");
    }

    #[test]
    fn test_prefix_rules() {
        let content = "Address,Amount\nqqbare,1\nkaspatest:qqt,2\nkaspa:qqm,3\n";

        let mainnet = parse_redistribution(content, MAINNET).unwrap();
        let addrs: Vec<_> = mainnet.transfers.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(addrs, ["kaspa:qqbare", "kaspa:qqm"]);
        assert_eq!(mainnet.invalid_lines, 1);
        assert!(!mainnet.has_trailer);

        let testnet = parse_redistribution(content, TESTNET).unwrap();
        let addrs: Vec<_> = testnet.transfers.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(addrs, ["kaspatest:qqbare", "kaspatest:qqt"]);
    }

    #[test]
    fn test_bad_amounts_are_counted_not_fatal() {
        let content = "Address,Amount\nkaspa:a,abc\nkaspa:b,0\nkaspa:c,-1\nkaspa:d,0.5\nno comma here\n";
        let parsed = parse_redistribution(content, MAINNET).unwrap();

        assert_eq!(parsed.valid_lines, 1);
        assert_eq!(parsed.invalid_lines, 3);
        assert_eq!(parsed.transfers[0].address, "kaspa:d");
    }

    #[test]
    fn test_missing_header_is_an_error() {
        assert!(parse_redistribution("kaspa:a,1\n", MAINNET).is_err());
    }

    #[test]
    fn test_totals() {
        let transfers = vec![
            Transfer::new("kaspa:a", dec("10"), "10"),
            Transfer::new("kaspa:b", dec("2.5"), "2.5"),
        ];
        assert_eq!(total_amount(&transfers), dec("12.5"));
        assert_eq!(
            total_with_fees(&transfers, dec("0.00002036")),
            dec("12.50004072")
        );
        assert_eq!(total_amount(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_format_list_reparses_byte_identical() {
        let transfers = vec![
            Transfer::new("kaspa:a", dec("1.50"), "1.50"),
            Transfer::new("kaspa:b", dec("7"), "7"),
        ];
        let text = format_list(&transfers);
        assert_eq!(
            text,
            "Address,Amount\nkaspa:a,1.50\nkaspa:b,7\nEnd of redistribution report\n"
        );
        assert_eq!(parse_redistribution(&text, MAINNET).unwrap().transfers, transfers);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Address,Amount\nkaspa:a,1\n{}\n", TRAILER).unwrap();

        let parsed = load_redistribution(file.path(), MAINNET).unwrap();
        assert_eq!(parsed.transfers.len(), 1);

        assert!(load_redistribution(Path::new("/nonexistent/list.txt"), MAINNET).is_err());
    }
}
