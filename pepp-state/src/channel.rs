//! versioned value channels
//!
//! a channel records every value written to one memory cell as a chain of
//! events. the chain lives in an arena owned by the channel and events are
//! addressed by [`EventId`], so endpoints are plain cursors that never own
//! anything.
//!
//! reverting a channel tombstones every event after the revert target and
//! points both of their links at the target, so a cursor left inside the
//! tombstoned region is carried back onto the live chain the next time it
//! moves. tombstones only ever sit past the tail, and the next append (or a
//! clear) reclaims their slots. each reclaim bumps the channel generation;
//! an endpoint positioned in an older generation whose slot has since been
//! reused resolves to the last slot that survived, exactly where the
//! tombstone would have sent it.

use std::iter::FusedIterator;

/// identifies the producer of an event; `0` is the channel itself
pub type PublisherId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(usize);

impl EventId {
    pub const HEAD: Self = Self(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    value: u8,
    publisher: PublisherId,
    displacement: usize,
    empty: bool,
    generation: u64,
    prev: Option<EventId>,
    next: Option<EventId>,
}

impl Event {
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn publisher(&self) -> PublisherId {
        self.publisher
    }

    /// logical time of the event; the head is at displacement 0
    pub fn displacement(&self) -> usize {
        self.displacement
    }

    /// true once the event has been reverted
    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    events: Vec<Event>,
    tail: EventId,
    default_value: u8,
    next_publisher: PublisherId,
    generation: u64,
}

impl Channel {
    pub fn new(default_value: u8) -> Self {
        let head = Event {
            value: default_value,
            publisher: 0,
            displacement: 0,
            empty: false,
            generation: 0,
            prev: None,
            next: None,
        };

        Self {
            events: vec![head],
            tail: EventId::HEAD,
            default_value,
            next_publisher: 1,
            generation: 0,
        }
    }

    pub fn default_value(&self) -> u8 {
        self.default_value
    }

    /// panics if `id` was not produced by this channel
    ///
    /// ids past the tail stop being valid once their slot is reclaimed.
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    fn event_mut(&mut self, id: EventId) -> &mut Event {
        &mut self.events[id.0]
    }

    pub fn head(&self) -> EventId {
        EventId::HEAD
    }

    pub fn latest(&self) -> EventId {
        self.tail
    }

    pub fn current_value(&self) -> u8 {
        self.event(self.tail).value
    }

    /// events held by the arena, head and unreclaimed tombstones included
    pub fn retained(&self) -> usize {
        self.events.len()
    }

    /// bumped every time tombstoned slots are reclaimed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// allocate a cursor with a fresh publisher id, positioned at the tail
    pub fn endpoint(&mut self) -> Endpoint {
        let publisher = self.next_publisher;
        self.next_publisher += 1;
        Endpoint {
            publisher,
            event: self.tail,
            generation: self.generation,
        }
    }

    /// a read-only cursor over every value after the head
    pub fn reader(&self) -> ChannelReader<'_> {
        ChannelReader {
            channel: self,
            cursor: Endpoint {
                publisher: 0,
                event: EventId::HEAD,
                generation: self.generation,
            },
        }
    }

    pub fn append(&mut self, publisher: PublisherId, value: u8) -> EventId {
        self.reclaim();

        let id = EventId(self.events.len());
        let displacement = self.event(self.tail).displacement + 1;

        self.events.push(Event {
            value,
            publisher,
            displacement,
            empty: false,
            generation: self.generation,
            prev: Some(self.tail),
            next: None,
        });

        let tail = self.tail;
        self.event_mut(tail).next = Some(id);
        self.tail = id;
        id
    }

    /// back out every event from `publisher`'s most recent write at or
    /// before `time` onward, returning the new tail
    ///
    /// a `time` past the tail reverts to the head.
    pub fn revert(&mut self, publisher: PublisherId, time: usize) -> EventId {
        let mut ptr = self.at(time).unwrap_or(EventId::HEAD);

        while let Some(prev) = self.event(ptr).prev {
            if self.event(ptr).publisher == publisher {
                break;
            }
            ptr = prev;
        }

        if let Some(prev) = self.event(ptr).prev {
            ptr = prev;
        }

        let mut fixup = self.event(ptr).next;
        while let Some(id) = fixup {
            let event = self.event_mut(id);
            fixup = event.next;
            event.prev = Some(ptr);
            event.next = Some(ptr);
            event.empty = true;
        }

        self.event_mut(ptr).next = None;
        self.tail = ptr;
        ptr
    }

    /// drop the tombstones past the tail
    fn reclaim(&mut self) {
        let live = self.tail.0 + 1;
        if self.events.len() > live {
            self.events.truncate(live);
            self.generation += 1;
        }
    }

    /// where a cursor left at `event` during `generation` stands now
    ///
    /// `Err` carries the last slot that outlived the cursor's own once that
    /// slot has been reclaimed. slots are reused in order, so every slot
    /// below the first reused one still holds the event the cursor saw.
    fn locate(&self, event: EventId, generation: u64) -> Result<EventId, EventId> {
        let len = self.events.len();
        if event.0 < len && self.events[event.0].generation <= generation {
            return Ok(event);
        }

        let mut index = event.0.min(len);
        while index > 0 {
            index -= 1;
            if self.events[index].generation <= generation {
                break;
            }
        }
        Err(EventId(index))
    }

    /// the live event at displacement `time`
    pub fn at(&self, time: usize) -> Option<EventId> {
        if time > self.event(self.tail).displacement {
            return None;
        }

        let mut ptr = EventId::HEAD;
        while self.event(ptr).displacement != time {
            ptr = self.event(ptr).next?;
        }
        Some(ptr)
    }

    /// the next live event after `event`, or `None` at the tail
    pub fn next(&self, event: EventId) -> Option<EventId> {
        Some(self.skip_forward(self.event(event).next?))
    }

    /// the previous live event before `event`, or `None` at the head
    pub fn previous(&self, event: EventId) -> Option<EventId> {
        Some(self.skip_backward(self.event(event).prev?))
    }

    fn skip_forward(&self, mut ptr: EventId) -> EventId {
        while self.event(ptr).empty {
            match self.event(ptr).next {
                Some(next) => ptr = next,
                None => break,
            }
        }
        ptr
    }

    fn skip_backward(&self, mut ptr: EventId) -> EventId {
        while self.event(ptr).empty {
            match self.event(ptr).prev {
                Some(prev) => ptr = prev,
                None => break,
            }
        }
        ptr
    }

    /// drop all history and restart from a head holding `value`
    pub fn clear(&mut self, value: u8) -> EventId {
        self.events.truncate(1);
        self.generation += 1;

        let head = self.event_mut(EventId::HEAD);
        head.value = value;
        head.next = None;

        self.default_value = value;
        self.tail = EventId::HEAD;
        EventId::HEAD
    }
}

/// a cursor into one channel
///
/// endpoints do not borrow their channel; every operation takes the
/// channel that created the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    publisher: PublisherId,
    event: EventId,
    generation: u64,
}

impl Endpoint {
    pub fn publisher(&self) -> PublisherId {
        self.publisher
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    fn position(&self, channel: &Channel) -> Result<EventId, EventId> {
        channel.locate(self.event, self.generation)
    }

    fn place(&mut self, channel: &Channel, event: EventId) {
        self.event = event;
        self.generation = channel.generation;
    }

    pub fn current<'c>(&self, channel: &'c Channel) -> &'c Event {
        let event = self.position(channel).unwrap_or_else(|target| target);
        channel.event(event)
    }

    pub fn current_value(&self, channel: &Channel) -> u8 {
        self.current(channel).value
    }

    pub fn current_time(&self, channel: &Channel) -> usize {
        self.current(channel).displacement
    }

    pub fn at_end(&self, channel: &Channel) -> bool {
        match self.position(channel) {
            Ok(event) => channel.next(event).is_none(),
            Err(_) => false,
        }
    }

    pub fn set_to_head(&mut self, channel: &Channel) -> u8 {
        self.place(channel, channel.head());
        self.current_value(channel)
    }

    pub fn set_to_tail(&mut self, channel: &Channel) -> u8 {
        self.place(channel, channel.latest());
        self.current_value(channel)
    }

    /// step forward one live event; `None` once caught up with the tail
    pub fn next<'c>(&mut self, channel: &'c Channel) -> Option<&'c Event> {
        let next = match self.position(channel) {
            Ok(event) => channel.next(event)?,
            Err(target) => channel.skip_forward(target),
        };
        self.place(channel, next);
        Some(channel.event(next))
    }

    /// step back one live event; `None` at the head
    pub fn unread<'c>(&mut self, channel: &'c Channel) -> Option<&'c Event> {
        let previous = match self.position(channel) {
            Ok(event) => {
                let previous = channel.previous(event)?;
                if previous == event {
                    return None;
                }
                previous
            }
            Err(target) => channel.skip_backward(target),
        };
        self.place(channel, previous);
        Some(channel.event(previous))
    }

    pub fn append<'c>(&mut self, channel: &'c mut Channel, value: u8) -> &'c Event {
        let event = channel.append(self.publisher, value);
        self.place(channel, event);
        channel.event(event)
    }

    /// retract this endpoint's latest write; `None` if nothing moved
    pub fn unwrite<'c>(&mut self, channel: &'c mut Channel) -> Option<&'c Event> {
        let current = self.position(channel).unwrap_or_else(|target| target);
        let time = channel.event(current).displacement;
        let reverted = channel.revert(self.publisher, time);
        if reverted == current {
            return None;
        }
        self.place(channel, reverted);
        Some(channel.event(reverted))
    }

    /// a new endpoint with its own publisher id at the same position
    pub fn fork(&self, channel: &mut Channel) -> Endpoint {
        let mut endpoint = channel.endpoint();
        endpoint.event = self.event;
        endpoint.generation = self.generation;
        endpoint
    }
}

/// iterates the values of a channel from just after the head to the tail
#[derive(Debug, Clone)]
pub struct ChannelReader<'c> {
    channel: &'c Channel,
    cursor: Endpoint,
}

impl<'c> Iterator for ChannelReader<'c> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.channel).map(Event::value)
    }
}

impl<'c> FusedIterator for ChannelReader<'c> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unwrite_restores_default() {
        let mut channel = Channel::new(5);
        let mut p1 = channel.endpoint();
        let mut c1 = channel.endpoint();
        assert_eq!(p1.publisher(), 1);
        assert_eq!(c1.publisher(), 2);

        p1.append(&mut channel, 254);
        let event = c1.next(&channel).unwrap();
        assert_eq!(event.value(), 254);
        assert_eq!(event.publisher(), 1);

        let reverted = p1.unwrite(&mut channel).unwrap();
        assert_eq!(reverted.value(), 5);

        let event = c1.next(&channel).unwrap();
        assert_eq!(event.value(), 5);
        assert_eq!(event.publisher(), 0);
        assert!(c1.next(&channel).is_none());
    }

    #[test]
    fn next_stops_at_tail() {
        let mut channel = Channel::new(0);
        let mut reader = channel.endpoint();
        assert!(reader.next(&channel).is_none());
        assert!(reader.at_end(&channel));

        let mut writer = channel.endpoint();
        writer.append(&mut channel, 1);
        writer.append(&mut channel, 2);
        assert!(!reader.at_end(&channel));

        assert_eq!(reader.next(&channel).map(Event::value), Some(1));
        assert_eq!(reader.next(&channel).map(Event::value), Some(2));
        assert!(reader.next(&channel).is_none());
        assert_eq!(reader.current_time(&channel), 2);
    }

    #[test]
    fn unread_walks_back_to_head() {
        let mut channel = Channel::new(7);
        let mut writer = channel.endpoint();
        let mut reader = channel.endpoint();
        writer.append(&mut channel, 1);
        writer.append(&mut channel, 2);

        reader.next(&channel);
        reader.next(&channel);
        assert_eq!(reader.unread(&channel).map(Event::value), Some(1));
        assert_eq!(reader.unread(&channel).map(Event::value), Some(7));
        assert!(reader.unread(&channel).is_none());
        assert_eq!(reader.next(&channel).map(Event::value), Some(1));
    }

    #[test]
    fn revert_interleaved_publishers() {
        let mut channel = Channel::new(0);
        let mut p1 = channel.endpoint();
        let mut p2 = channel.endpoint();
        let mut stale = channel.endpoint();

        p1.append(&mut channel, 1);
        p2.append(&mut channel, 2);
        p1.append(&mut channel, 3);
        while stale.next(&channel).is_some() {}
        assert_eq!(stale.current_value(&channel), 3);

        // backs out p2's write and everything after it
        assert_eq!(p2.unwrite(&mut channel).map(Event::value), Some(1));
        assert_eq!(channel.current_value(), 1);
        assert!(channel.event(p1.event()).is_empty());

        // the stale cursor is carried back to the revert target
        assert_eq!(stale.next(&channel).map(Event::value), Some(1));
        assert!(stale.next(&channel).is_none());

        let values = channel.reader().collect::<Vec<_>>();
        assert_eq!(values, vec![1]);
    }

    #[test]
    fn revert_past_tail_collapses_to_head() {
        let mut channel = Channel::new(9);
        let mut p1 = channel.endpoint();
        let mut p2 = channel.endpoint();

        p1.append(&mut channel, 1);
        p1.append(&mut channel, 2);
        p2.append(&mut channel, 3);
        p2.unwrite(&mut channel);
        assert_eq!(channel.current_value(), 2);
        assert!(channel.at(3).is_none());

        let reverted = channel.revert(p1.publisher(), 3);
        assert_eq!(reverted, channel.head());
        assert_eq!(channel.current_value(), 9);
        assert_eq!(channel.reader().count(), 0);
    }

    #[test]
    fn at_matches_latest() {
        let mut channel = Channel::new(0);
        let mut endpoints = (0..3).map(|_| channel.endpoint()).collect::<Vec<_>>();

        for value in 0..12u8 {
            let endpoint = &mut endpoints[value as usize % 3];
            endpoint.append(&mut channel, value);

            let latest = channel.latest();
            let time = channel.event(latest).displacement();
            assert_eq!(channel.at(time), Some(latest));
        }
        assert!(channel.at(13).is_none());
    }

    #[test]
    fn clear_restarts_history() {
        let mut channel = Channel::new(1);
        let mut writer = channel.endpoint();
        writer.append(&mut channel, 2);
        writer.append(&mut channel, 3);

        channel.clear(0xAA);
        assert_eq!(channel.current_value(), 0xAA);
        assert_eq!(channel.default_value(), 0xAA);
        assert_eq!(channel.reader().count(), 0);

        let event = writer.append(&mut channel, 4);
        assert_eq!(event.displacement(), 1);
        assert_eq!(channel.reader().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn fork_shares_position() {
        let mut channel = Channel::new(0);
        let mut writer = channel.endpoint();
        writer.append(&mut channel, 1);

        let mut fork = writer.fork(&mut channel);
        assert_ne!(fork.publisher(), writer.publisher());
        assert_eq!(fork.event(), writer.event());

        fork.append(&mut channel, 2);
        // the first writer's last write is behind the fork's
        assert_eq!(writer.unwrite(&mut channel).map(Event::value), Some(0));
        assert_eq!(channel.reader().count(), 0);
    }

    #[test]
    fn clear_reclaims_the_arena() {
        let mut channel = Channel::new(0);
        let mut writer = channel.endpoint();
        for value in 0..10_000u32 {
            writer.append(&mut channel, value as u8);
        }
        assert_eq!(channel.retained(), 10_001);

        channel.clear(0);
        assert_eq!(channel.retained(), 1);

        writer.append(&mut channel, 1);
        assert_eq!(writer.event().index(), 1);
        assert_eq!(channel.retained(), 2);
    }

    #[test]
    fn unwrite_then_append_reuses_slots() {
        let mut channel = Channel::new(0);
        let mut writer = channel.endpoint();
        for value in 0..1000u32 {
            writer.append(&mut channel, value as u8);
            assert!(writer.unwrite(&mut channel).is_some());
        }
        writer.append(&mut channel, 7);

        assert_eq!(channel.latest().index(), 1);
        assert_eq!(channel.retained(), 2);
        assert_eq!(channel.reader().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn reclaimed_cursor_resumes_at_revert_target() {
        let mut channel = Channel::new(0);
        let mut p1 = channel.endpoint();
        let mut p2 = channel.endpoint();
        let mut stale = channel.endpoint();

        p1.append(&mut channel, 1);
        p2.append(&mut channel, 2);
        p1.append(&mut channel, 3);
        while stale.next(&channel).is_some() {}

        p2.unwrite(&mut channel);
        let generation = channel.generation();
        // the append reuses the slot the stale cursor sits on
        p1.append(&mut channel, 4);
        assert_eq!(channel.generation(), generation + 1);
        assert_eq!(channel.retained(), 3);

        assert!(!stale.at_end(&channel));
        assert_eq!(stale.current_value(&channel), 1);
        assert_eq!(stale.next(&channel).map(Event::value), Some(1));
        assert_eq!(stale.next(&channel).map(Event::value), Some(4));
        assert!(stale.next(&channel).is_none());
    }

    #[test]
    fn cleared_cursor_falls_back_to_head() {
        let mut channel = Channel::new(0);
        let mut writer = channel.endpoint();
        let mut reader = channel.endpoint();
        writer.append(&mut channel, 1);
        writer.append(&mut channel, 2);
        reader.next(&channel);
        reader.next(&channel);

        channel.clear(5);
        writer.append(&mut channel, 6);

        assert_eq!(reader.next(&channel).map(Event::value), Some(5));
        assert_eq!(reader.next(&channel).map(Event::value), Some(6));
        assert_eq!(reader.unread(&channel).map(Event::value), Some(5));
    }

    #[test]
    fn set_to_head_and_tail() {
        let mut channel = Channel::new(3);
        let mut writer = channel.endpoint();
        writer.append(&mut channel, 4);

        assert_eq!(writer.set_to_head(&channel), 3);
        assert_eq!(writer.set_to_tail(&channel), 4);
    }
}
