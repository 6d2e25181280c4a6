//! FFmpeg filter graph builders.

use newsreel_models::{
    CanvasFit, CanvasSize, CaptionEvent, CaptionStyle, HorizontalAnchor,
};

/// Final pixel format for every encoded stream.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Scale to the cover size, then crop the canvas window out of the centre.
pub fn cover_fit_filter(fit: &CanvasFit, canvas: CanvasSize) -> String {
    format!(
        "scale={}:{}:flags=lanczos,crop={}:{}:{}:{},setsar=1",
        fit.scaled_width, fit.scaled_height, canvas.width, canvas.height, fit.crop_x, fit.crop_y
    )
}

/// Linear centre zoom from 1.0 to `terminal_scale` over `frames` frames.
///
/// zoompan crops `iw/zoom x ih/zoom` out of a canvas-sized frame and scales
/// it back up to the canvas, so no frame ever shows an edge.
pub fn zoompan_filter(terminal_scale: f64, frames: u64, fps: u32, canvas: CanvasSize) -> String {
    let frames = frames.max(1);
    format!(
        "zoompan=z='1+{:.6}*on/{}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={}:s={}x{}:fps={}",
        terminal_scale - 1.0,
        frames,
        frames,
        canvas.width,
        canvas.height,
        fps
    )
}

/// Constant frame rate and player-safe pixel format.
pub fn output_format_filter(fps: u32) -> String {
    format!("fps={},format={}", fps, PIXEL_FORMAT)
}

/// Concatenate `count` video-only inputs labelled `[0:v]..[n-1:v]`.
pub fn concat_filter(count: usize, out_label: &str) -> String {
    let inputs: String = (0..count).map(|i| format!("[{}:v]", i)).collect();
    format!("{}concat=n={}:v=1:a=0[{}]", inputs, count, out_label)
}

/// Make text safe inside a single-quoted drawtext value.
///
/// Straight quotes become typographic ones and backslashes are dropped, so
/// the value survives both levels of filter graph unquoting.
pub fn escape_drawtext(text: &str) -> String {
    text.chars()
        .filter(|ch| *ch != '\\')
        .map(|ch| match ch {
            '\'' => '\u{2019}',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Escape a file path used as a filter option value.
pub fn escape_filter_path(path: &std::path::Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// One drawtext filter showing `event` only during its time range.
pub fn drawtext_filter(event: &CaptionEvent, style: &CaptionStyle) -> String {
    let x = match event.position.x {
        HorizontalAnchor::Center => "(w-text_w)/2".to_string(),
        HorizontalAnchor::Offset(px) => px.to_string(),
    };

    let mut filter = String::from("drawtext=");
    if let Some(font) = &style.font_file {
        filter.push_str(&format!("fontfile='{}':", escape_filter_path(font)));
    }
    filter.push_str(&format!(
        "text='{}':expansion=none:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x={}:y={}:enable='between(t,{:.3},{:.3})'",
        escape_drawtext(&event.text),
        style.font_size_for(&event.text),
        style.fill_color,
        style.stroke_width,
        style.stroke_color,
        x,
        event.position.y,
        event.start,
        event.end,
    ));
    filter
}

/// Chain of drawtext filters for every caption, or `None` when there are none.
pub fn caption_chain(events: &[CaptionEvent], style: &CaptionStyle) -> Option<String> {
    if events.is_empty() {
        return None;
    }
    Some(
        events
            .iter()
            .map(|e| drawtext_filter(e, style))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Background music looped input attenuated and cut to `total_secs`.
pub fn music_bed_filter(input: usize, gain: f64, total_secs: f64, out_label: &str) -> String {
    format!(
        "[{}:a]volume={:.3},atrim=0:{:.3},asetpts=PTS-STARTPTS[{}]",
        input, gain, total_secs, out_label
    )
}

/// Narration over the music bed; the narration's length decides the output.
pub fn narration_mix_filter(narration: &str, bed: &str, out_label: &str) -> String {
    format!(
        "[{}][{}]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[{}]",
        narration, bed, out_label
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsreel_models::CaptionPosition;

    fn caption(text: &str, start: f64, end: f64) -> CaptionEvent {
        CaptionEvent {
            text: text.to_string(),
            start,
            end,
            position: CaptionPosition::default(),
        }
    }

    #[test]
    fn test_cover_fit_filter() {
        let fit = CanvasFit {
            scaled_width: 3413,
            scaled_height: 1920,
            crop_x: 1166,
            crop_y: 0,
        };
        let filter = cover_fit_filter(&fit, CanvasSize::default());
        assert!(filter.starts_with("scale=3413:1920"));
        assert!(filter.contains("crop=1080:1920:1166:0"));
    }

    #[test]
    fn test_concat_filter() {
        assert_eq!(concat_filter(3, "base"), "[0:v][1:v][2:v]concat=n=3:v=1:a=0[base]");
    }

    #[test]
    fn test_drawtext_enable_window() {
        let filter = drawtext_filter(&caption("BREAKING", 0.5, 0.6), &CaptionStyle::default());
        assert!(filter.contains("text='BREAKING'"));
        assert!(filter.contains("enable='between(t,0.500,0.600)'"));
        assert!(filter.contains("fontcolor=yellow"));
        assert!(filter.contains("borderw=4"));
        assert!(filter.contains("y=1400"));
        assert!(filter.contains("x=(w-text_w)/2"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("IT'S"), "IT\u{2019}S");
        assert_eq!(escape_drawtext("C:\\DOS"), "C:DOS");
        assert_eq!(escape_drawtext("LINE\nBREAK"), "LINE BREAK");
    }

    #[test]
    fn test_caption_chain_empty() {
        assert!(caption_chain(&[], &CaptionStyle::default()).is_none());
        let chain = caption_chain(
            &[caption("A", 0.0, 0.1), caption("B", 0.1, 0.2)],
            &CaptionStyle::default(),
        )
        .unwrap();
        assert_eq!(chain.matches("drawtext=").count(), 2);
    }

    #[test]
    fn test_audio_filters() {
        let bed = music_bed_filter(4, 0.12, 42.3, "bed");
        assert_eq!(bed, "[4:a]volume=0.120,atrim=0:42.300,asetpts=PTS-STARTPTS[bed]");
        let mix = narration_mix_filter("3:a", "bed", "aout");
        assert!(mix.contains("amix=inputs=2:duration=first"));
        assert!(mix.contains("normalize=0"));
    }

    #[test]
    fn test_zoompan_filter() {
        let filter = zoompan_filter(1.15, 240, 24, CanvasSize::default());
        assert!(filter.contains("z='1+0.150000*on/240'"));
        assert!(filter.contains("d=240"));
        assert!(filter.contains("s=1080x1920"));
    }
}
