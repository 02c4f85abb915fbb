//! The about page, shown for F3 during POST or from the settings screen.

use kdisplay::{COLUMNS, TextDisplay, attr};

pub fn draw(d: &dyn TextDisplay) {
    d.clear(attr::DIALOG_DIM);
    d.put_str("About SeaPig BIOS", 31, 0, attr::NORMAL);
    for col in 0..COLUMNS {
        d.set_attr(col, 0, attr::TITLE);
        d.set_attr(col, 24, attr::BRIGHT);
        d.put_char(b'=', col, 23, attr::DIALOG);
    }

    d.put_fmt(
        2,
        3,
        attr::DIALOG,
        format_args!("SeaPig 486 Single Board Computer BIOS Version {}", crate::VERSION),
    );
    d.put_str("Made for M8SBC-486 REV 1.0X (Hamster 1 chipset)", 2, 5, attr::DIALOG);
    d.put_str(
        "By: maniek86 (Piotr Grzesik), 2024-2026,  maniek86.xyz",
        2,
        6,
        attr::DIALOG,
    );
    d.put_str("Sources: https://github.com/maniekx86/M8SBC-486", 2, 8, attr::DIALOG_DIM);
    d.put_str(
        "See also: https://maniek86.xyz/projects/m8sbc_486.php",
        2,
        9,
        attr::DIALOG_DIM,
    );
    d.put_str(
        "Base code derived from BIOS by d-mitry1 licensed under MIT",
        2,
        17,
        attr::DIALOG,
    );
    d.put_str("Press ESC to exit and continue", 24, 24, attr::BRIGHT);
}
