//! Text assets of a radio station mod
//!
//! Every builder is a pure function from names and tracks to file contents;
//! writing is left to [`super::ModGenerator`].

use std::fmt::Write as _;

/// UTF-8 byte order mark; the game only reads localisation files that start with it
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One song packaged into the mod
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    /// Script identifier (`music_<hex>`), also the localisation key
    pub id: String,
    /// Human-readable title shown in the music player
    pub display_name: String,
    /// File name inside the mod's music directory
    pub file_name: String,
}

/// Make `value` safe to embed between double quotes in a script file
pub fn quote_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect()
}

/// `descriptor.mod` inside the mod folder
pub fn mod_descriptor(display_name: &str, game_version: &str, mod_version: &str) -> String {
    format!(
        "version=\"{mod_version}\"\ntags={{\n\t\"Sound\"\n}}\nname=\"{}\"\nsupported_version=\"{game_version}\"\n",
        quote_safe(display_name)
    )
}

/// `<name>.mod` next to the mod folder, pointing the launcher at it
pub fn launcher_descriptor(
    name: &str,
    display_name: &str,
    game_version: &str,
    mod_version: &str,
) -> String {
    let mut out = mod_descriptor(display_name, game_version, mod_version);
    let _ = writeln!(out, "path=\"mod/{name}\"");
    out
}

/// English localisation (without the BOM, see [`UTF8_BOM`])
pub fn localisation(name: &str, display_name: &str, tracks: &[Track]) -> String {
    let mut out = format!(
        "l_english:\n  {name}_TITLE: \"{} Radio\"\n",
        quote_safe(display_name)
    );
    for track in tracks {
        let _ = writeln!(out, "  {}: \"{}\"", track.id, quote_safe(&track.display_name));
    }
    out
}

/// Station definition: `music/<name>/<name>_music.txt`
pub fn music_definition(name: &str, tracks: &[Track]) -> String {
    let mut out = format!("music_station = \"{name}\"\n");
    for track in tracks {
        let _ = writeln!(
            out,
            "music = {{ song = \"{}\" chance = {{ factor = 1 modifier = {{ factor = 1 }} }} }}",
            track.id
        );
    }
    out
}

/// Sound asset list: `music/<name>/<name>_music.asset`
pub fn music_asset(tracks: &[Track], volume: f64) -> String {
    let mut out = String::new();
    for track in tracks {
        let _ = writeln!(
            out,
            "music = {{ name = \"{}\" file = \"{}\" volume = {volume} }}",
            track.id, track.file_name
        );
    }
    out
}

/// Faceplate sprite: `interface/<name>.gfx`
pub fn gfx(name: &str) -> String {
    format!(
        r#"spriteTypes = {{
    spriteType = {{
        name = "GFX_{name}_faceplate"
        texturefile = "gfx/{name}_faceplate.dds"
        noOfFrames = 2
    }}
}}
"#
    )
}

/// Music player window and station entry: `interface/<name>.gui`
pub fn gui(name: &str) -> String {
    GUI_TEMPLATE.replace("{name}", name)
}

const GUI_TEMPLATE: &str = r#"guiTypes = {
	containerWindowType = {
		name = "{name}_faceplate"
		position = { x =0 y=0 }
		size = { width = 590 height = 46 }

		iconType = {
			name = "musicplayer_header_bg"
			spriteType = "GFX_musicplayer_header_bg"
			position = { x= 0 y = 0 }
		}

		instantTextboxType = {
			name = "track_name"
			position = { x = 72 y = 20 }
			font = "hoi_20b"
			text = ""
			maxWidth = 450
			maxHeight = 25
			format = center
		}

		instantTextboxType = {
			name = "track_elapsed"
			position = { x = 124 y = 30 }
			font = "hoi_18b"
			text = "00:00"
			maxWidth = 50
			maxHeight = 25
			format = center
		}

		instantTextboxType = {
			name = "track_duration"
			position = { x = 420 y = 30 }
			font = "hoi_18b"
			text = "00:00"
			maxWidth = 50
			maxHeight = 25
			format = center
		}

		buttonType = {
			name = "prev_button"
			position = { x = 220 y = 20 }
			quadTextureSprite = "GFX_musicplayer_previous_button"
			buttonFont = "Main_14_black"
			Orientation = "LOWER_LEFT"
			clicksound = click_close
			pdx_tooltip = "MUSICPLAYER_PREV"
		}

		buttonType = {
			name = "play_button"
			position = { x = 263 y = 20 }
			quadTextureSprite = "GFX_musicplayer_play_pause_button"
			buttonFont = "Main_14_black"
			Orientation = "LOWER_LEFT"
			clicksound = click_close
		}

		buttonType = {
			name = "next_button"
			position = { x = 336 y = 20 }
			quadTextureSprite = "GFX_musicplayer_next_button"
			buttonFont = "Main_14_black"
			Orientation = "LOWER_LEFT"
			clicksound = click_close
			pdx_tooltip = "MUSICPLAYER_NEXT"
		}

		extendedScrollbarType = {
			name = "volume_slider"
			position = { x = 100 y = 45}
			size = { width = 75 height = 18 }
			tileSize = { width = 12 height = 12}
			maxValue = 100
			minValue = 0
			stepSize = 1
			startValue = 50
			horizontal = yes
			orientation = lower_left
			origo = lower_left
			setTrackFrameOnChange = yes

			slider = {
				name = "Slider"
				quadTextureSprite = "GFX_scroll_drager"
				position = { x=0 y = 1 }
				pdx_tooltip = "MUSICPLAYER_ADJUST_VOL"
			}

			track = {
				name = "Track"
				quadTextureSprite = "GFX_volume_track"
				position = { x=0 y = 3 }
				alwaystransparent = yes
				pdx_tooltip = "MUSICPLAYER_ADJUST_VOL"
			}
		}

		buttonType = {
			name = "shuffle_button"
			position = { x = 425 y = 20 }
			quadTextureSprite = "GFX_toggle_shuffle_buttons"
			buttonFont = "Main_14_black"
			Orientation = "LOWER_LEFT"
			clicksound = click_close
		}
	}

	containerWindowType = {
		name = "{name}_stations_entry"
		size = { width = 162 height = 130 }
		checkBoxType = {
			name = "select_station_button"
			position = { x = 0 y = 0 }
			quadTextureSprite = "GFX_{name}_faceplate"
			clicksound = decisions_ui_button
		}
	}
}
"#;
