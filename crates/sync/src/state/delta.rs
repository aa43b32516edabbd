use super::{DIRTY_WORD_BITS, SyncState};
use crate::bits::{BitBuffer, FlagEncoder};
use crate::buffer::Timestamped;
use crate::error::SyncError;
use crate::tick::{EntityId, IdEncoder, Tick, TickEncoder};

/// A transmitted per-entity update: either a (possibly partial) state at a
/// tick, or a destruction notice.
///
/// Wire layout, in LIFO read order:
///
/// ```text
/// [ entity id ] [ tick ] [ has_immutable_data : 1 ] [ is_destroyed : 1 ]
/// [ if destroyed: removed tick ]
/// [ else: dirty word, then each flagged field in declaration order ]
/// ```
#[derive(Debug, Clone)]
pub struct StateDelta<S> {
    pub entity_id: EntityId,
    pub tick: Tick,
    pub flags: u32,
    pub state: S,
    pub is_destroyed: bool,
    pub has_immutable_data: bool,
    pub removed_tick: Tick,
}

impl<S: SyncState> StateDelta<S> {
    /// A state-carrying update frame.
    pub fn update(
        entity_id: EntityId,
        tick: Tick,
        flags: u32,
        state: S,
        has_immutable_data: bool,
    ) -> Self {
        Self {
            entity_id,
            tick,
            flags,
            state,
            is_destroyed: false,
            has_immutable_data,
            removed_tick: Tick::INVALID,
        }
    }

    /// A destruction notice.
    pub fn destroy(entity_id: EntityId, tick: Tick, removed_tick: Tick) -> Self {
        Self {
            entity_id,
            tick,
            flags: 0,
            state: S::default(),
            is_destroyed: true,
            has_immutable_data: false,
            removed_tick,
        }
    }

    pub fn encode(&self, buf: &mut BitBuffer) {
        if self.is_destroyed {
            buf.push_with(&TickEncoder, &self.removed_tick);
        } else {
            self.state.encode_fields(buf, self.flags);
            buf.push_with(&FlagEncoder::new(DIRTY_WORD_BITS), &self.flags);
        }
        buf.push_bool(self.is_destroyed);
        buf.push_bool(self.has_immutable_data);
        buf.push_with(&TickEncoder, &self.tick);
        buf.push_with(&IdEncoder, &self.entity_id);
    }

    /// Decodes one frame. Fields absent from the dirty word take the basis
    /// value when a basis is given and the zero value otherwise; `merge_from`
    /// with the decoded flags only touches the fields actually carried.
    pub fn decode(buf: &mut BitBuffer, basis: Option<&S>) -> Result<Self, SyncError> {
        let entity_id = buf.pop_with(&IdEncoder)?;
        let tick = buf.pop_with(&TickEncoder)?;
        let has_immutable_data = buf.pop_bool()?;
        let is_destroyed = buf.pop_bool()?;

        if is_destroyed {
            let removed_tick = buf.pop_with(&TickEncoder)?;
            let mut delta = Self::destroy(entity_id, tick, removed_tick);
            delta.has_immutable_data = has_immutable_data;
            return Ok(delta);
        }

        let flags = buf.pop_with(&FlagEncoder::new(DIRTY_WORD_BITS))?;
        if flags & !S::all_fields() != 0 {
            return Err(SyncError::ProtocolMismatch {
                flags,
                known: S::FIELD_COUNT,
            });
        }
        let fallback = S::default();
        let state = S::decode_fields(buf, flags, basis.unwrap_or(&fallback))?;
        Ok(Self::update(entity_id, tick, flags, state, has_immutable_data))
    }
}

impl<S> Timestamped for StateDelta<S> {
    fn tick(&self) -> Tick {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TestState, state_eq};

    fn sample() -> TestState {
        TestState {
            archetype: 1,
            team: 7,
            pos: glam::Vec2::new(10.0, 20.0),
            angle: 0.0,
            energy: 0,
        }
    }

    #[test]
    fn full_snapshot_roundtrip() {
        let state = sample();
        let mut buf = BitBuffer::new();
        let delta = StateDelta::update(
            EntityId::new(3),
            Tick::new(50),
            TestState::all_fields(),
            state.clone(),
            true,
        );
        delta.encode(&mut buf);

        let decoded = StateDelta::<TestState>::decode(&mut buf, None).unwrap();
        assert!(buf.is_empty());
        assert_eq!(decoded.entity_id, EntityId::new(3));
        assert_eq!(decoded.tick, Tick::new(50));
        assert!(decoded.has_immutable_data);
        assert!(!decoded.is_destroyed);
        assert!(state_eq(&decoded.state, &state));
    }

    #[test]
    fn delta_carries_only_dirty_fields() {
        let basis = sample();
        let mut moved = basis.clone();
        moved.pos.y = 20.5;

        let flags = moved.dirty_flags(&basis);
        assert_eq!(flags, TestState::FLAG_Y);

        let mut buf = BitBuffer::new();
        let delta = StateDelta::update(EntityId::new(3), Tick::new(51), flags, moved.clone(), false);
        delta.encode(&mut buf);
        let before_header = buf.bits_used();
        // id + tick + 2 control bits + dirty word + one 17-bit coordinate
        assert_eq!(before_header, 32 + 32 + 2 + DIRTY_WORD_BITS as usize + 17);

        let decoded = StateDelta::<TestState>::decode(&mut buf, Some(&basis)).unwrap();
        assert!(state_eq(&decoded.state, &moved));
    }

    #[test]
    fn destroy_roundtrip() {
        let mut buf = BitBuffer::new();
        let delta = StateDelta::<TestState>::destroy(EntityId::new(9), Tick::new(80), Tick::new(81));
        delta.encode(&mut buf);

        let decoded = StateDelta::<TestState>::decode(&mut buf, None).unwrap();
        assert!(decoded.is_destroyed);
        assert_eq!(decoded.removed_tick, Tick::new(81));
        assert!(buf.is_empty());
    }

    #[test]
    fn unknown_field_flag_is_a_protocol_mismatch() {
        // Frame hand-built as a sender with more fields than TestState knows
        // would emit it: no field payloads, a dirty word naming field 6.
        let mut buf = BitBuffer::new();
        buf.push_with(
            &FlagEncoder::new(DIRTY_WORD_BITS),
            &(1 << TestState::FIELD_COUNT),
        );
        buf.push_bool(false);
        buf.push_bool(false);
        buf.push_with(&TickEncoder, &Tick::new(5));
        buf.push_with(&IdEncoder, &EntityId::new(1));

        let err = StateDelta::<TestState>::decode(&mut buf, None).unwrap_err();
        assert!(matches!(err, SyncError::ProtocolMismatch { .. }));
    }

    #[test]
    fn truncated_frame_underruns() {
        let mut buf = BitBuffer::new();
        buf.push(0xABCD, 16);
        let err = StateDelta::<TestState>::decode(&mut buf, None).unwrap_err();
        assert!(matches!(err, SyncError::Underrun { .. }));
    }
}
