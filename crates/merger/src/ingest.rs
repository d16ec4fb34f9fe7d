//! §4.2 step 1-2: decode a wire attack vector and forward it as a single-vector Attack to
//! the change-attack topic.

use doscrawler_broker::PartitionedTopic;
use doscrawler_model::{Attack, WireAttackVector};

use crate::error::MergerError;
use crate::message::{attack_key, ChangeAttack};

pub async fn ingest_vector(
    wire: WireAttackVector,
    change_attack_topic: &PartitionedTopic<ChangeAttack>,
) -> Result<(), MergerError> {
    let vector = doscrawler_model::AttackVector::try_from(wire)?;
    let attack = Attack::from_vector(vector);
    let key = attack_key(attack.ip, attack.start_time);
    change_attack_topic.send(key, ChangeAttack::Add(attack)).await?;
    Ok(())
}
