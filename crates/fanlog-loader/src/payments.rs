use chrono::{DateTime, Local};
use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

const PAYMENT_REASONS: &[&str] = &["pay bill", "replayment", "owed money", "temp loan", "buy goods"];
const FIRST_NAMES: &[&str] = &[
    "Suzi", "Bobby", "Gertrude", "Gordon", "Mandy", "Sandy", "Randy", "Candy", "Bambi",
];
const LAST_NAMES: &[&str] = &[
    "Brown",
    "Jones",
    "Roberts",
    "McDonald",
    "Barrett",
    "Saunders",
    "Reid",
    "Whittington-Smythe",
    "Parker-Tweed",
];

/// A simulated payment between two bank accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub payment_ref: String,
    pub payer_sort_code: String,
    pub payer_acc_num: String,
    pub payer_name: String,
    pub payee_sort_code: String,
    pub payee_acc_num: String,
    pub payee_name: String,
    pub amount: String,
}

/// Id of the `seq`-th record of dataset `dataset_id`.
pub fn record_id(dataset_id: usize, seq: u64) -> String {
    format!("{dataset_id}_{seq}")
}

impl PaymentRecord {
    pub fn random<R: Rng>(dataset_id: usize, seq: u64, rng: &mut R) -> Self {
        Self {
            id: record_id(dataset_id, seq),
            timestamp: Local::now(),
            payment_ref: pick(PAYMENT_REASONS, rng),
            payer_sort_code: rng.random_range(111_111..=999_999_u32).to_string(),
            payer_acc_num: rng.random_range(111_111_111..=999_999_999_u32).to_string(),
            payer_name: random_name(rng),
            payee_sort_code: rng.random_range(111_111..=999_999_u32).to_string(),
            payee_acc_num: rng.random_range(111_111_111..=999_999_999_u32).to_string(),
            payee_name: random_name(rng),
            amount: rng.random_range(1..=99_999_u32).to_string(),
        }
    }
}

fn pick<R: Rng>(pool: &[&str], rng: &mut R) -> String {
    pool.choose(rng).copied().unwrap_or_default().to_owned()
}

fn random_name<R: Rng>(rng: &mut R) -> String {
    format!("{} {}", pick(FIRST_NAMES, rng), pick(LAST_NAMES, rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_records_use_the_value_pools() {
        let mut rng = rand::rng();
        for seq in 0..200 {
            let record = PaymentRecord::random(3, seq, &mut rng);
            assert_eq!(record.id, format!("3_{seq}"));
            assert!(PAYMENT_REASONS.contains(&record.payment_ref.as_str()));

            for code in [&record.payer_sort_code, &record.payee_sort_code] {
                assert_eq!(code.len(), 6);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
            }
            for acc in [&record.payer_acc_num, &record.payee_acc_num] {
                assert_eq!(acc.len(), 9);
            }

            let (first, last) = record.payer_name.split_once(' ').unwrap();
            assert!(FIRST_NAMES.contains(&first));
            assert!(LAST_NAMES.contains(&last));

            let amount: u32 = record.amount.parse().unwrap();
            assert!((1..=99_999).contains(&amount));
        }
    }

    #[test]
    fn serializes_with_document_id() {
        let record = PaymentRecord::random(0, 7, &mut rand::rng());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["_id"], "0_7");
        let back: PaymentRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
