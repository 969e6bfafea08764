//! Broadcast message shaping: rosters, per-tick state and final placements

use std::cmp::Reverse;

use crate::lobby::{Player, PlayerRegistry};
use crate::ws::protocol::{Placement, PlayerSnapshot, RosterEntry, ServerMsg};

use super::session::Seat;
use super::SessionState;

/// Roster entries for every seat whose player is still registered
pub fn roster(seats: &[Seat], players: &PlayerRegistry) -> Vec<RosterEntry> {
    seated_players(seats, players)
        .map(|(index, p)| RosterEntry {
            id: p.id,
            index,
            username: p.username.clone(),
        })
        .collect()
}

/// Build a `game_state` message
pub fn build_state(
    tick: u64,
    timer_secs: f32,
    state: SessionState,
    seats: &[Seat],
    players: &PlayerRegistry,
) -> ServerMsg {
    let snapshots = seated_players(seats, players)
        .map(|(index, p)| PlayerSnapshot {
            id: p.id,
            index,
            username: p.username.clone(),
            alive: p.alive,
            score: p.score,
            position: p.position,
            velocity: p.velocity,
        })
        .collect();

    ServerMsg::GameState {
        tick,
        timer: timer_secs,
        state,
        players: snapshots,
    }
}

/// Rank players by alive first, then score, both descending. Ties keep seat order.
pub fn placements<'a, I>(candidates: I) -> Vec<Placement>
where
    I: IntoIterator<Item = &'a Player>,
{
    let mut ranked: Vec<&Player> = candidates.into_iter().collect();
    ranked.sort_by_key(|p| (Reverse(p.alive), Reverse(p.score)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| Placement {
            player_id: p.id,
            placement: i as u32 + 1,
            score: p.score,
        })
        .collect()
}

fn seated_players<'a>(
    seats: &'a [Seat],
    players: &'a PlayerRegistry,
) -> impl Iterator<Item = (usize, &'a Player)> + 'a {
    seats
        .iter()
        .enumerate()
        .filter_map(move |(index, seat)| players.get(&seat.player_id).map(|p| (index, p)))
}
