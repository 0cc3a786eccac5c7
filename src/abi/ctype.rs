//! Bionic's character classification tables.
//!
//! Bionic exports `_ctype_`, `_tolower_tab_` and `_toupper_tab_` as
//! pointer variables. Each table has one leading entry for `EOF` followed
//! by one entry per byte value.

use std::ptr::addr_of;

pub const U: u8 = 0x01;
pub const L: u8 = 0x02;
pub const N: u8 = 0x04;
pub const S: u8 = 0x08;
pub const P: u8 = 0x10;
pub const C: u8 = 0x20;
pub const X: u8 = 0x40;
pub const B: u8 = 0x80;

const fn class_of(c: u8) -> u8 {
    match c {
        b'\t'..=b'\r' => C | S,
        0..=0x1f | 0x7f => C,
        b' ' => S | B,
        b'0'..=b'9' => N,
        b'A'..=b'F' => U | X,
        b'G'..=b'Z' => U,
        b'a'..=b'f' => L | X,
        b'g'..=b'z' => L,
        0x21..=0x7e => P,
        _ => 0,
    }
}

const fn build_ctype() -> [u8; 257] {
    let mut table = [0u8; 257];
    let mut c = 0;
    while c < 256 {
        table[c + 1] = class_of(c as u8);
        c += 1;
    }
    table
}

const fn build_case(upper: bool) -> [i16; 257] {
    let mut table = [0i16; 257];
    table[0] = -1;
    let mut c = 0;
    while c < 256 {
        let b = c as u8;
        let mapped = if upper { b.to_ascii_uppercase() } else { b.to_ascii_lowercase() };
        table[c + 1] = mapped as i16;
        c += 1;
    }
    table
}

pub static CTYPE: [u8; 257] = build_ctype();
pub static TOLOWER: [i16; 257] = build_case(false);
pub static TOUPPER: [i16; 257] = build_case(true);

/// A data symbol whose value is the address of a table.
#[repr(transparent)]
pub struct TablePointer<T: 'static>(*const T);

unsafe impl<T> Sync for TablePointer<T> {}

impl<T> TablePointer<T> {
    pub fn address(&self) -> usize {
        self as *const Self as usize
    }
}

pub static CTYPE_PTR: TablePointer<u8> = TablePointer(addr_of!(CTYPE).cast());
pub static TOLOWER_PTR: TablePointer<i16> = TablePointer(addr_of!(TOLOWER).cast());
pub static TOUPPER_PTR: TablePointer<i16> = TablePointer(addr_of!(TOUPPER).cast());
