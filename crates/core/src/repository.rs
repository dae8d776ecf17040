use commerce_helcim_types::Payment;
use indexmap::IndexMap;
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Payment {0} not found")]
    NotFound(u64),
    #[error("Payment storage failed: {0}")]
    Storage(String),
}

/// Persistence for payment records.
///
/// `save` must be atomic per record; concurrent saves of the same payment are
/// last-writer-wins.
pub trait PaymentRepository: Send + Sync {
    /// Insert or update a payment, assigning an id on first save
    fn save(&self, payment: &mut Payment) -> Result<u64, RepositoryError>;

    fn load(&self, id: u64) -> Result<Payment, RepositoryError>;

    fn load_for_order(&self, order_id: &str) -> Result<Vec<Payment>, RepositoryError>;
}

#[derive(Default)]
struct InMemoryState {
    next_id: u64,
    payments: IndexMap<u64, Payment>,
}

/// Process-local repository used by the CLI and in tests
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    state: Mutex<InMemoryState>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn save(&self, payment: &mut Payment) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock();
        let id = match payment.id {
            Some(id) => id,
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        payment.id = Some(id);
        state.payments.insert(id, payment.clone());
        Ok(id)
    }

    fn load(&self, id: u64) -> Result<Payment, RepositoryError> {
        self.state
            .lock()
            .payments
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    fn load_for_order(&self, order_id: &str) -> Result<Vec<Payment>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use commerce_helcim_types::Price;

    use super::*;

    #[test]
    fn test_save_assigns_ids_and_updates_in_place() {
        let repo = InMemoryPaymentRepository::new();
        let mut first = Payment::new("1", Price::parse("10.00", "USD").unwrap());
        let mut second = Payment::new("2", Price::parse("20.00", "USD").unwrap());

        assert_eq!(repo.save(&mut first).unwrap(), 1);
        assert_eq!(repo.save(&mut second).unwrap(), 2);
        assert_eq!(first.id, Some(1));

        first.remote_state = Some("APPROVED".into());
        assert_eq!(repo.save(&mut first).unwrap(), 1);
        assert_eq!(repo.len(), 2);
        assert_eq!(
            repo.load(1).unwrap().remote_state.as_deref(),
            Some("APPROVED")
        );
    }

    #[test]
    fn test_load_missing_and_by_order() {
        let repo = InMemoryPaymentRepository::new();
        assert!(matches!(repo.load(9), Err(RepositoryError::NotFound(9))));

        let mut payment = Payment::new("7", Price::parse("1.00", "USD").unwrap());
        repo.save(&mut payment).unwrap();
        assert_eq!(repo.load_for_order("7").unwrap().len(), 1);
        assert!(repo.load_for_order("8").unwrap().is_empty());
    }
}
