use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

/// Generates a fresh public order identifier: `ord-` followed by 12 random alphanumeric characters.
pub fn new_order_id() -> OrderId {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect();
    OrderId(format!("ord-{suffix}"))
}
