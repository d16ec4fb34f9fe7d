//! The change-attack topic's value type.
//!
//! The upstream Faust app encodes the add/delete action as a string prefix on the message
//! key (`"add/{ip}/{start_time}"`, `"delete/{ip}/{start_time}"`, per
//! `doscrawler/attacks/agents.py::change_attacks`). This typed broker has no use for
//! stringly-typed key prefixes, so the action is a variant tag instead; the key is always
//! just `{ip}/{start_time}`.

use std::net::Ipv4Addr;

use doscrawler_model::{Attack, Timestamp};

#[derive(Clone, Debug)]
pub enum ChangeAttack {
    Add(Attack),
    Delete {
        ip: Ipv4Addr,
        start_time: Timestamp,
        latest_time: Timestamp,
    },
}

pub fn attack_key(ip: Ipv4Addr, start_time: Timestamp) -> String {
    format!("{ip}/{start_time}")
}
