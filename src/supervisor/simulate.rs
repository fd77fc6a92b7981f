//! Scripted placeholder subtitles for degraded mode.
//!
//! While a listener is in [`Simulating`](super::ConnectionState::Simulating)
//! the supervisor cycles through a short fixed script in the room's language.
//! Simulated events carry their own sequence numbers and are always flagged
//! as simulated when emitted, so they are never mistaken for live content.

use crate::bus::SubtitleEvent;
use crate::room::{Language, Room, RoomId};

const SCRIPT_ZH: &[&str] = &[
    "欢迎收听实时传译。",
    "直播信号暂时中断，正在重新连接。",
    "以下为演示字幕。",
];

const SCRIPT_KO: &[&str] = &[
    "실시간 통역에 오신 것을 환영합니다.",
    "방송 신호가 일시적으로 끊겼습니다. 다시 연결 중입니다.",
    "다음은 데모 자막입니다.",
];

const SCRIPT_VI: &[&str] = &[
    "Chào mừng bạn đến với phiên dịch trực tiếp.",
    "Tín hiệu phát sóng tạm thời bị gián đoạn, đang kết nối lại.",
    "Sau đây là phụ đề minh họa.",
];

#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    room: RoomId,
    script: &'static [&'static str],
    cursor: usize,
    sequence: u64,
}

impl SimulatedFeed {
    pub fn new(room: RoomId) -> Self {
        let script = match Room::for_id(room).output_language() {
            Language::Chinese => SCRIPT_ZH,
            Language::Korean => SCRIPT_KO,
            Language::Vietnamese => SCRIPT_VI,
        };
        Self {
            room,
            script,
            cursor: 0,
            sequence: 0,
        }
    }

    /// Next scripted line, stamped with epoch millis `now`.
    pub fn next_event(&mut self, now: u64) -> SubtitleEvent {
        let text = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        self.sequence += 1;
        SubtitleEvent {
            room: self.room,
            text: text.to_string(),
            timestamp: now,
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_script_in_room_language() {
        let mut feed = SimulatedFeed::new(RoomId::Kr);
        let texts: Vec<_> = (0..4).map(|i| feed.next_event(i).text).collect();
        assert_eq!(texts[0], SCRIPT_KO[0]);
        assert_eq!(texts[3], SCRIPT_KO[0]);
    }

    #[test]
    fn sequences_increase() {
        let mut feed = SimulatedFeed::new(RoomId::Vn);
        let a = feed.next_event(1);
        let b = feed.next_event(2);
        assert_eq!((a.sequence, b.sequence), (1, 2));
        assert_eq!(b.timestamp, 2);
    }
}
