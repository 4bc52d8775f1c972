//! Landmark sources.
//!
//! A recorded stream is JSON lines, one frame per line, each frame an array of
//! hands and each hand an array of `[x, y, z]` points. A blank line is a frame
//! in which no hand was detected.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{FrameLandmarks, Hand};

/// Supplies one [`FrameLandmarks`] per capture tick.
pub trait LandmarkSource {
    /// The next frame, or `Ok(None)` when the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameLandmarks>>;
}

pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line: usize,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// 1-based number of the last line read.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameLandmarks>> {
        let Some(text) = self.lines.next().transpose()? else {
            return Ok(None);
        };
        self.line += 1;
        parse_frame(&text, self.line).map(Some)
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<FrameLandmarks>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

fn parse_frame(text: &str, line: usize) -> Result<FrameLandmarks> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Hand>>(text).map_err(|e| Error::MalformedFrame {
        line,
        reason: e.to_string(),
    })
}

/// Drain a source into memory.
pub fn read_all<S: LandmarkSource + ?Sized>(source: &mut S) -> Result<Vec<FrameLandmarks>> {
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame()? {
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_frames_and_blank_lines() {
        let input = "[[[0.1,0.2,0.0],[0.3,0.4,-0.1]]]\n\n[]\n";
        let mut src = JsonLinesSource::new(Cursor::new(input));

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].num_landmarks(), 2);
        assert!((first[0][1].z + 0.1).abs() < 1e-6);

        assert!(src.next_frame().unwrap().unwrap().is_empty());
        assert!(src.next_frame().unwrap().unwrap().is_empty());
        assert!(src.next_frame().unwrap().is_none());
        assert_eq!(src.line(), 3);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let input = "[]\n[[[0.1,0.2]]]\n";
        let mut src = JsonLinesSource::new(Cursor::new(input));
        assert!(src.next_frame().is_ok());
        match src.next_frame() {
            Err(Error::MalformedFrame { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn read_all_collects_frames() {
        let input = "[]\n[[[0.5,0.5,0.0]]]\n";
        let frames = read_all(&mut JsonLinesSource::new(Cursor::new(input))).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1][0][0].x, 0.5);
    }
}
