//! Portal endpoint constants.
//!
//! Portal paths resolve against the session base URL; the JAccount SSO
//! paths resolve against the configurable SSO base URL.

/// Default base URL of the backend APIs.
pub const DEFAULT_BASE_URL: &str = "https://i.sjtu.edu.cn";

/// Default base URL of the JAccount SSO service.
pub const DEFAULT_SSO_BASE_URL: &str = "https://jaccount.sjtu.edu.cn";

/// JAccount login form submission endpoint, relative to the SSO base.
pub const LOGIN_POST_PATH: &str = "/jaccount/ulogin";
/// JAccount captcha image endpoint, keyed by the login page uuid.
pub const CAPTCHA_PATH: &str = "/jaccount/captcha";

/// Login entry point; a GET here refreshes the server-side OAuth token.
pub const LOGIN_URL: &str = "/jaccountlogin";
pub const LOGOUT_URL: &str = "/logout";
/// Landing page of an authenticated session.
pub const HOME_URL: &str = "/xtgl/index_initMenu.html";
/// Path the portal redirects to when the session is not authenticated.
pub const LOGIN_PAGE_PATH: &str = "/xtgl/login_slogin.html";

pub const PROFILE_URL: &str = "/xsxxxggl/xsgrxxwh_cxXsgrxx.html?gnmkdm=N100801&layout=default&su=";
pub const SCHEDULE_URL: &str = "/kbcx/xskbcx_cxXsKb.html?gnmkdm=N2151";
pub const SCORE_URL: &str = "/cjcx/cjcx_cxDgXscj.html?doType=query&gnmkdm=N305005";
pub const SCORE_DETAIL_URL: &str = "/cjcx/cjcx_cxXsXmcjList.html?gnmkdm=N305007&su=";
pub const EXAM_URL: &str = "/kwgl/kscx_cxXsksxxIndex.html?doType=query&gnmkdm=N358105&su=";
pub const CALENDAR_URL: &str = "/xtgl/index_cxshjdAreaFive.html?localeKey=zh_CN&gnmkdm=index&su=";
pub const COURSELIB_URL: &str = "/design/funcData_cxFuncDataList.html?func_widget_guid=DA1B5BB30E1F4CB99D1F6F526537777B&gnmkdm=N219904&su=";
pub const GPA_PARAMS_URL: &str = "/cjgl/common_cxGnzdxxList.html?gnmkdm=N309130";
pub const GPA_CALC_URL: &str = "/cjpmtj/gpapmtj_tjGpapmtj.html?gnmkdm=N309131&su=";
pub const GPA_QUERY_URL: &str = "/cjpmtj/gpapmtj_cxGpaxjfcxIndex.html?doType=query&gnmkdm=N309131&su=";

pub const SELECTION_ALL_SECTORS_PARAM_URL: &str =
    "/xsxk/zzxkyzb_cxZzxkYzbIndex.html?gnmkdm=N253512&layout=default&su=";
pub const SELECTION_SECTOR_PARAM_URL: &str = "/xsxk/zzxkyzb_cxZzxkYzbDisplay.html?gnmkdm=N253512&su=";
pub const SELECTION_QUERY_COURSES: &str = "/xsxk/zzxkyzb_cxZzxkYzbPartDisplay.html?gnmkdm=N253512&su=";
pub const SELECTION_QUERY_CLASSES: &str = "/xsxk/zzxkyzb_cxJxbWithKchZzxkYzb.html?gnmkdm=N253512&su=";
pub const SELECTION_REGISTER: &str = "/xsxk/zzxkyzb_xkBcZyZzxkYzb.html?gnmkdm=N253512&su=";
pub const SELECTION_IS_REGISTERED: &str = "/xsxk/zzxkyzb_xkJcInXksjZzxkYzb.html?gnmkdm=N253512&su=";
pub const SELECTION_DEREGISTER: &str = "/xsxk/zzxkyzb_tuikBcZzxkYzb.html?gnmkdm=N253512&su=";

/// Browser-like headers the JAccount login form expects.
pub const LOGIN_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Linux x86_64; rv:71.0) Gecko/20100101 Firefox/71.0",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
    ),
    (
        "Accept-Language",
        "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7,zh-TW;q=0.6",
    ),
];

/// Wire codes for the three terms of an academic year (term 0, 1, 2).
pub const TERMS: [u8; 3] = [3, 12, 16];
