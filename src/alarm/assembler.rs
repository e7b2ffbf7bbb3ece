use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

const OPEN_TAG: &[u8] = b"<EventNotificationAlert";
const CLOSE_TAG: &[u8] = b"</EventNotificationAlert>";

/// Cuts complete alarm documents out of the multipart alert stream.
///
/// The stream interleaves MIME boundaries, part headers and XML bodies, and a
/// body may arrive split across several socket reads. Everything outside an
/// `EventNotificationAlert` element is discarded.
pub struct FrameAssembler {
    buffer: BytesMut,
    max_frame_bytes: usize,
    dropped_frames: u64,
}

impl FrameAssembler {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame_bytes,
            dropped_frames: 0,
        }
    }

    /// Append a chunk and return every document it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_subslice(&self.buffer, OPEN_TAG) else {
                // The tail may hold the first bytes of a split open tag
                let keep = OPEN_TAG.len() - 1;
                if self.buffer.len() > keep {
                    let discard = self.buffer.len() - keep;
                    self.buffer.advance(discard);
                }
                break;
            };
            self.buffer.advance(start);

            match self.buffer.get(OPEN_TAG.len()).copied() {
                None => break,
                Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {}
                Some(_) => {
                    // Longer element name sharing the prefix
                    self.buffer.advance(1);
                    continue;
                }
            }

            match find_subslice(&self.buffer, CLOSE_TAG) {
                Some(end) => {
                    let frame = self.buffer.split_to(end + CLOSE_TAG.len()).freeze();
                    trace!("Assembled alarm frame of {} bytes", frame.len());
                    frames.push(frame);
                }
                None if self.buffer.len() > self.max_frame_bytes => {
                    debug!(
                        "Discarding unterminated alarm frame after {} bytes",
                        self.buffer.len()
                    );
                    self.dropped_frames += 1;
                    self.buffer.advance(OPEN_TAG.len());
                }
                None => break,
            }
        }

        frames
    }

    /// Bytes held back waiting for the rest of a document
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Documents abandoned for exceeding the size limit
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Forget any partial document, e.g. after the connection dropped
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<EventNotificationAlert version=\"2.0\"><channelID>1</channelID>\
                       <activePostCount>1</activePostCount><eventType>VMD</eventType>\
                       <eventState>active</eventState></EventNotificationAlert>";

    fn part(body: &str) -> String {
        format!(
            "--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\nContent-Length: {}\r\n\r\n{}\r\n",
            body.len(),
            body
        )
    }

    #[test]
    fn test_extracts_document_from_multipart_part() {
        let mut assembler = FrameAssembler::new(4096);

        let frames = assembler.push(part(DOC).as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], DOC.as_bytes());
        assert!(assembler.pending_bytes() < OPEN_TAG.len());
    }

    #[test]
    fn test_reassembles_document_split_across_reads() {
        let mut assembler = FrameAssembler::new(4096);
        let stream = part(DOC);
        let (first, second) = stream.split_at(stream.len() / 2);

        assert!(assembler.push(first.as_bytes()).is_empty());
        let frames = assembler.push(second.as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], DOC.as_bytes());
    }

    #[test]
    fn test_open_tag_split_across_reads() {
        let mut assembler = FrameAssembler::new(4096);
        let stream = part(DOC);
        let split = stream.find("<EventNotificationAlert").unwrap() + 6;

        assert!(assembler.push(stream[..split].as_bytes()).is_empty());
        let frames = assembler.push(stream[split..].as_bytes());

        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_multiple_documents_in_one_read() {
        let mut assembler = FrameAssembler::new(4096);
        let stream = format!("HTTP/1.1 200 OK\r\n\r\n{}{}", part(DOC), part(DOC));

        let frames = assembler.push(stream.as_bytes());

        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_oversized_document_is_dropped() {
        let mut assembler = FrameAssembler::new(64);
        let garbage = format!("<EventNotificationAlert>{}", "x".repeat(128));

        assert!(assembler.push(garbage.as_bytes()).is_empty());
        assert_eq!(assembler.dropped_frames(), 1);

        // The limit applies to buffering, a complete document still comes through
        let frames = assembler.push(part(DOC).as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], DOC.as_bytes());
    }

    #[test]
    fn test_clear_discards_partial_document() {
        let mut assembler = FrameAssembler::new(4096);
        let stream = part(DOC);

        assembler.push(stream[..stream.len() - 10].as_bytes());
        assert!(assembler.pending_bytes() > 0);

        assembler.clear();
        assert_eq!(assembler.pending_bytes(), 0);
        assert!(assembler.push(stream[stream.len() - 10..].as_bytes()).is_empty());
    }
}
