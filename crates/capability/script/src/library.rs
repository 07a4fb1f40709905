/// 每个脚本 context 预先加载的 `gw` 工具库。
///
/// 偏移 `o` 缺省为 0，长度 `n` 缺省到末尾。加载后移除 `WebAssembly`。
pub(crate) const LIBRARY: &str = r#"
(function (global) {
  'use strict';
  const view = (b) => (b instanceof Uint8Array ? b : Uint8Array.from(b || []));
  const span = (b, o, n) => {
    b = view(b);
    o = o || 0;
    n = n === undefined ? b.length - o : n;
    return b.subarray(o, o + n);
  };
  const dv = (b) => new DataView(b.buffer, b.byteOffset, b.byteLength);
  const gw = {
    u16be(b, o) { b = view(b); o = o || 0; return (b[o] << 8) | b[o + 1]; },
    u16le(b, o) { b = view(b); o = o || 0; return b[o] | (b[o + 1] << 8); },
    i16be(b, o) { const v = gw.u16be(b, o); return v & 0x8000 ? v - 0x10000 : v; },
    u32be(b, o) { b = view(b); o = o || 0; return dv(b).getUint32(o, false); },
    u32le(b, o) { b = view(b); o = o || 0; return dv(b).getUint32(o, true); },
    i32be(b, o) { b = view(b); o = o || 0; return dv(b).getInt32(o, false); },
    f32be(b, o) { b = view(b); o = o || 0; return dv(b).getFloat32(o, false); },
    f32le(b, o) { b = view(b); o = o || 0; return dv(b).getFloat32(o, true); },
    bcd(b, o, n) {
      let s = '';
      for (const x of span(b, o, n)) s += ((x >> 4) & 0x0f).toString() + (x & 0x0f).toString();
      return s;
    },
    hex(b, o, n) {
      return Array.from(span(b, o, n), (x) => x.toString(16).padStart(2, '0')).join('');
    },
    ascii(b, o, n) { return String.fromCharCode.apply(null, Array.from(span(b, o, n))); },
    crc16(b, o, n) {
      let crc = 0xffff;
      for (const x of span(b, o, n)) {
        crc ^= x;
        for (let i = 0; i < 8; i++) crc = crc & 1 ? (crc >>> 1) ^ 0xa001 : crc >>> 1;
      }
      return crc;
    },
    sum8(b, o, n) {
      let s = 0;
      for (const x of span(b, o, n)) s = (s + x) & 0xff;
      return s;
    },
    bytes(list) { return Uint8Array.from(list || []); },
  };
  Object.freeze(gw);
  Object.defineProperty(global, 'gw', { value: gw, enumerable: false });
  delete global.WebAssembly;
})(globalThis);
"#;
