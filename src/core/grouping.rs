//! Partitioning of input addresses into per-domain batches.

use crate::core::models::Address;
use std::collections::HashMap;

/// The addresses of one domain, in input order. Each batch is verified over
/// a single session by a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainBatch {
    pub domain: String,
    pub addresses: Vec<Address>,
}

/// Groups `addresses` by domain.
///
/// Batches come out in the order their domain was first seen, and addresses
/// keep their input order within a batch.
pub fn group_by_domain(addresses: impl IntoIterator<Item = Address>) -> Vec<DomainBatch> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut batches: Vec<DomainBatch> = Vec::new();

    for address in addresses {
        match index.get(&address.domain) {
            Some(&i) => batches[i].addresses.push(address),
            None => {
                index.insert(address.domain.clone(), batches.len());
                batches.push(DomainBatch {
                    domain: address.domain.clone(),
                    addresses: vec![address],
                });
            }
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address::parse_address;

    fn addr(s: &str) -> Address {
        parse_address(s).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_domain(Vec::new()).is_empty());
    }

    #[test]
    fn test_groups_preserve_order() {
        let batches = group_by_domain(vec![
            addr("a@one.example"),
            addr("b@two.example"),
            addr("c@one.example"),
            addr("d@three.example"),
            addr("e@two.example"),
        ]);

        let domains: Vec<&str> = batches.iter().map(|b| b.domain.as_str()).collect();
        assert_eq!(domains, vec!["one.example", "two.example", "three.example"]);

        let one: Vec<&str> = batches[0]
            .addresses
            .iter()
            .map(|a| a.username.as_str())
            .collect();
        assert_eq!(one, vec!["a", "c"]);
        assert_eq!(batches[1].addresses.len(), 2);
        assert_eq!(batches[2].addresses.len(), 1);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let batches = group_by_domain(vec![addr("a@one.example"), addr("a@one.example")]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].addresses.len(), 2);
    }
}
