//! YouTube transcript extraction.
//!
//! The cheap path fetches the watch page, digs `ytInitialPlayerResponse` out
//! of the inline script soup with a brace walker, picks the best caption
//! track and fetches its document. The browser-interception fallback lives
//! in the pipeline crate (it needs the headless controller); the payload
//! parsers here are shared by both paths.

pub mod captions;
pub mod derive;
pub mod player;
pub mod transcript;
pub mod urls;

pub use captions::{parse_timedtext_payload, TranscriptSegment};
pub use derive::{derive_chapters, derive_key_points, derive_summary, Chapter};
pub use player::{extract_player_response, select_caption_track, CaptionTrack, VideoDetails};
pub use transcript::{fetch_transcript, Transcript};
pub use urls::parse_video_id;
